// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation logging middleware for FuseDB.
//
// Emits one `tracing` event before and one after every intercepted primitive
// at a configurable level, with the key and (optionally) the value as
// structured fields. Errors reported through `on_error` are always logged at
// `warn`. Where the events end up is up to the subscriber the application
// installs.

use std::fmt;

use async_trait::async_trait;
use fuse_core::{EngineError, HookError, Middleware, Replace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Level;

/// Emit an event at a level chosen at runtime.
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            Level::ERROR => tracing::error!(target: "fuse::ops", $($arg)+),
            Level::WARN => tracing::warn!(target: "fuse::ops", $($arg)+),
            Level::INFO => tracing::info!(target: "fuse::ops", $($arg)+),
            Level::DEBUG => tracing::debug!(target: "fuse::ops", $($arg)+),
            _ => tracing::trace!(target: "fuse::ops", $($arg)+),
        }
    };
}

/// Serializable logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerOptions {
    /// Level name: `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Log full values rather than a placeholder.
    pub include_values: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            include_values: true,
        }
    }
}

/// Middleware that logs every intercepted operation.
#[derive(Debug, Clone)]
pub struct LoggerMiddleware {
    level: Level,
    include_values: bool,
}

impl Default for LoggerMiddleware {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_values: true,
        }
    }
}

impl LoggerMiddleware {
    /// Log at `info`, including values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from serializable options. Unknown level names are rejected.
    pub fn from_options(options: &LoggerOptions) -> Result<Self, EngineError> {
        let level = options.level.parse::<Level>().map_err(|_| {
            EngineError::InvalidConfig(format!("unknown log level '{}'", options.level))
        })?;
        Ok(Self {
            level,
            include_values: options.include_values,
        })
    }

    /// Log operations at `level`.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Whether values appear in the log output.
    pub fn include_values(mut self, include: bool) -> Self {
        self.include_values = include;
        self
    }

    /// The level operations are logged at.
    pub fn level(&self) -> Level {
        self.level
    }

    fn shown<'a>(&self, value: Option<&'a Value>) -> Shown<'a> {
        Shown {
            value,
            redact: !self.include_values,
        }
    }
}

/// Display adapter for a possibly redacted, possibly absent value.
struct Shown<'a> {
    value: Option<&'a Value>,
    redact: bool,
}

impl fmt::Display for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.value, self.redact) {
            (None, _) => f.write_str("<absent>"),
            (Some(_), true) => f.write_str("<redacted>"),
            (Some(v), false) => write!(f, "{v}"),
        }
    }
}

#[async_trait]
impl Middleware for LoggerMiddleware {
    fn name(&self) -> &str {
        "logger"
    }

    async fn before_get(&self, key: &str) -> Result<Option<Value>, HookError> {
        event_at!(self.level, op = "get", key, "before get");
        Ok(None)
    }

    async fn after_get(
        &self,
        key: &str,
        value: Option<&Value>,
    ) -> Result<Replace<Option<Value>>, HookError> {
        event_at!(
            self.level,
            op = "get",
            key,
            found = value.is_some(),
            value = %self.shown(value),
            "after get"
        );
        Ok(Replace::Keep)
    }

    async fn before_set(&self, key: &str, value: &Value) -> Result<Option<Value>, HookError> {
        event_at!(self.level, op = "set", key, value = %self.shown(Some(value)), "before set");
        Ok(None)
    }

    async fn after_set(&self, key: &str, value: &Value) -> Result<(), HookError> {
        event_at!(self.level, op = "set", key, value = %self.shown(Some(value)), "after set");
        Ok(())
    }

    async fn before_remove(&self, key: &str) -> Result<(), HookError> {
        event_at!(self.level, op = "remove", key, "before remove");
        Ok(())
    }

    async fn after_remove(&self, key: &str) -> Result<(), HookError> {
        event_at!(self.level, op = "remove", key, "after remove");
        Ok(())
    }

    async fn before_has(&self, key: &str) -> Result<Option<bool>, HookError> {
        event_at!(self.level, op = "has", key, "before has");
        Ok(None)
    }

    async fn after_has(&self, key: &str, exists: bool) -> Result<Option<bool>, HookError> {
        event_at!(self.level, op = "has", key, exists, "after has");
        Ok(None)
    }

    fn on_error(&self, error: &EngineError) -> Result<(), HookError> {
        tracing::warn!(target: "fuse::ops", %error, "operation error");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(max: Level) -> (Captured, tracing::subscriber::DefaultGuard) {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(max)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (out, tracing::subscriber::set_default(subscriber))
    }

    #[tokio::test]
    async fn test_logs_key_and_value() {
        let (out, _guard) = capture(Level::INFO);
        let logger = LoggerMiddleware::new();

        logger.before_set("user:1", &json!({"name": "ada"})).await.unwrap();
        logger.after_get("user:1", None).await.unwrap();

        let text = out.text();
        assert!(text.contains("before set"));
        assert!(text.contains("user:1"));
        assert!(text.contains("ada"));
        assert!(text.contains("<absent>"));
    }

    #[tokio::test]
    async fn test_redacts_values_when_asked() {
        let (out, _guard) = capture(Level::INFO);
        let logger = LoggerMiddleware::new().include_values(false);

        logger.after_set("k", &json!("hunter2")).await.unwrap();

        let text = out.text();
        assert!(text.contains("<redacted>"));
        assert!(!text.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_level_filters_output() {
        let (out, _guard) = capture(Level::INFO);
        let logger = LoggerMiddleware::new().with_level(Level::DEBUG);

        logger.before_remove("quiet").await.unwrap();
        assert!(!out.text().contains("quiet"));

        logger.on_error(&EngineError::InvalidKey("loud".into())).unwrap();
        assert!(out.text().contains("loud"));
    }

    #[tokio::test]
    async fn test_never_alters_the_operation() {
        let logger = LoggerMiddleware::new();
        assert_eq!(logger.before_get("k").await.unwrap(), None);
        assert_eq!(logger.after_get("k", Some(&json!(1))).await.unwrap(), Replace::Keep);
        assert_eq!(logger.before_set("k", &json!(1)).await.unwrap(), None);
        assert_eq!(logger.before_has("k").await.unwrap(), None);
        assert_eq!(logger.after_has("k", true).await.unwrap(), None);
    }

    #[test]
    fn test_from_options() {
        let logger = LoggerMiddleware::from_options(&LoggerOptions {
            level: "debug".into(),
            include_values: false,
        })
        .unwrap();
        assert_eq!(logger.level(), Level::DEBUG);
        assert!(!logger.include_values);

        let options: LoggerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, LoggerOptions::default());

        assert!(LoggerMiddleware::from_options(&LoggerOptions {
            level: "loud".into(),
            include_values: true,
        })
        .is_err());
    }
}
