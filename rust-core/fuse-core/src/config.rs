// SPDX-License-Identifier: PMPL-1.0-or-later
//! Engine configuration.
//!
//! [`EngineConfig`] carries the collaborators chosen at construction time
//! (driver, middleware, event bus); [`EngineSettings`] carries the plain,
//! serializable tunables.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::driver::Driver;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, DEFAULT_EVENT_CAPACITY};
use crate::middleware::Middleware;

/// Environment variable overriding [`EngineSettings::event_capacity`].
pub const ENV_EVENT_CAPACITY: &str = "FUSE_EVENT_CAPACITY";
/// Environment variable overriding [`EngineSettings::enforce_connection`].
pub const ENV_ENFORCE_CONNECTION: &str = "FUSE_ENFORCE_CONNECTION";

/// Serializable engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// How many lifecycle events a slow subscriber may fall behind by.
    pub event_capacity: usize,
    /// Reject data operations while the engine is disconnected.
    ///
    /// Off by default: the connection flag is informational and every
    /// operation is forwarded to the driver regardless.
    pub enforce_connection: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            enforce_connection: false,
        }
    }
}

impl EngineSettings {
    /// Defaults, overridden by `FUSE_EVENT_CAPACITY` and
    /// `FUSE_ENFORCE_CONNECTION` when they are set.
    pub fn from_env() -> EngineResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EngineResult<Self> {
        let mut settings = Self::default();

        if let Some(raw) = lookup(ENV_EVENT_CAPACITY) {
            settings.event_capacity = raw.trim().parse().map_err(|_| {
                EngineError::InvalidConfig(format!("{ENV_EVENT_CAPACITY}={raw} is not a number"))
            })?;
        }

        if let Some(raw) = lookup(ENV_ENFORCE_CONNECTION) {
            settings.enforce_connection = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(EngineError::InvalidConfig(format!(
                        "{ENV_ENFORCE_CONNECTION}={raw} is not a boolean"
                    )))
                }
            };
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings for values the engine cannot work with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.event_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything needed to construct an [`Engine`].
///
/// A missing driver defaults to [`crate::InMemoryDriver`]; a missing event
/// bus defaults to a fresh one sized by `settings.event_capacity`.
#[derive(Default, Clone)]
pub struct EngineConfig {
    /// The storage driver to bind.
    pub driver: Option<Arc<dyn Driver>>,
    /// Middleware in the order their hooks run.
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// Bus on which lifecycle events are published.
    pub events: Option<EventBus>,
    /// Plain tunables.
    pub settings: EngineSettings,
}

impl EngineConfig {
    /// Use `driver` instead of the in-memory default.
    pub fn with_driver(mut self, driver: impl Driver + 'static) -> Self {
        self.driver = Some(Arc::new(driver));
        self
    }

    /// Use an already shared driver handle.
    pub fn with_shared_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Append a middleware to the end of the chain.
    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Append an already shared middleware handle.
    pub fn with_shared_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Publish lifecycle events on `events`.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the tunables.
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Construct the engine.
    pub fn build(self) -> EngineResult<Engine> {
        Engine::new(self)
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("driver", &self.driver.as_ref().map(|d| d.name().to_string()))
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name().to_string()).collect::<Vec<_>>(),
            )
            .field("events", &self.events.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}
