// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metrics-collecting middleware for FuseDB.
//
// Counts intercepted operations, read hits and misses, bytes written and
// reported errors. It never alters values or short-circuits a call, so it can
// sit anywhere in the chain. Counters are atomics because `on_error` is a
// synchronous hook.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fuse_core::{EngineError, HookError, Middleware, Replace};
use serde::Serialize;
use serde_json::Value;

/// Accumulated statistics for an engine.
///
/// All counters are monotonically increasing until [`MetricsMiddleware::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MiddlewareStats {
    /// Number of completed `get` operations.
    pub get_count: u64,
    /// `get` operations that produced a value.
    pub hits: u64,
    /// `get` operations that produced nothing.
    pub misses: u64,
    /// Number of completed `set` operations.
    pub set_count: u64,
    /// Number of completed `remove` operations.
    pub remove_count: u64,
    /// Number of completed `has` operations.
    pub has_count: u64,
    /// Errors reported by the engine.
    pub error_count: u64,
    /// Total JSON-encoded bytes passed to `set`.
    pub total_bytes_written: u64,
}

impl MiddlewareStats {
    /// Fraction of reads that found a value, or `None` before the first read.
    pub fn hit_rate(&self) -> Option<f64> {
        (self.get_count > 0).then(|| self.hits as f64 / self.get_count as f64)
    }
}

#[derive(Debug, Default)]
struct Counters {
    get_count: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    set_count: AtomicU64,
    remove_count: AtomicU64,
    has_count: AtomicU64,
    error_count: AtomicU64,
    total_bytes_written: AtomicU64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

/// Middleware that collects operation statistics.
///
/// Clones share the same counters, so keep a clone to read the statistics
/// after handing the middleware to an engine.
///
/// # Example
///
/// ```rust
/// use fuse_core::Engine;
/// use fuse_middleware::MetricsMiddleware;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let metrics = MetricsMiddleware::new();
/// let engine = Engine::builder()
///     .with_middleware(metrics.clone())
///     .build()
///     .unwrap();
///
/// engine.set("key", json!("value")).await.unwrap();
/// engine.get("key").await.unwrap();
///
/// let stats = metrics.stats();
/// assert_eq!(stats.set_count, 1);
/// assert_eq!(stats.get_count, 1);
/// assert_eq!(stats.hits, 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsMiddleware {
    counters: Arc<Counters>,
}

impl MetricsMiddleware {
    /// Create a middleware with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot of the current statistics.
    pub fn stats(&self) -> MiddlewareStats {
        let c = &self.counters;
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        MiddlewareStats {
            get_count: load(&c.get_count),
            hits: load(&c.hits),
            misses: load(&c.misses),
            set_count: load(&c.set_count),
            remove_count: load(&c.remove_count),
            has_count: load(&c.has_count),
            error_count: load(&c.error_count),
            total_bytes_written: load(&c.total_bytes_written),
        }
    }

    /// Reset all statistics to zero.
    pub fn reset(&self) {
        let c = &self.counters;
        for counter in [
            &c.get_count,
            &c.hits,
            &c.misses,
            &c.set_count,
            &c.remove_count,
            &c.has_count,
            &c.error_count,
            &c.total_bytes_written,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn after_get(
        &self,
        _key: &str,
        value: Option<&Value>,
    ) -> Result<Replace<Option<Value>>, HookError> {
        bump(&self.counters.get_count, 1);
        match value {
            Some(_) => bump(&self.counters.hits, 1),
            None => bump(&self.counters.misses, 1),
        }
        Ok(Replace::Keep)
    }

    async fn after_set(&self, _key: &str, value: &Value) -> Result<(), HookError> {
        bump(&self.counters.set_count, 1);
        // Serializing a Value cannot fail; count zero bytes if it somehow does.
        let bytes = serde_json::to_vec(value).map(|b| b.len()).unwrap_or(0);
        bump(&self.counters.total_bytes_written, bytes as u64);
        Ok(())
    }

    async fn after_remove(&self, _key: &str) -> Result<(), HookError> {
        bump(&self.counters.remove_count, 1);
        Ok(())
    }

    async fn after_has(&self, _key: &str, _exists: bool) -> Result<Option<bool>, HookError> {
        bump(&self.counters.has_count, 1);
        Ok(None)
    }

    fn on_error(&self, _error: &EngineError) -> Result<(), HookError> {
        bump(&self.counters.error_count, 1);
        Ok(())
    }
}
