// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Middleware contract for FuseDB.
//
// A middleware is a set of optional interception hooks around the four
// primitive operations (`get`, `set`, `remove`, `has`) plus an error
// notification hook. Every hook has a default body that does nothing, so an
// implementation only overrides the hooks it cares about. Hooks carry no
// storage logic of their own.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{EngineError, HookError};

/// Outcome of a hook that may replace the value flowing through the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Replace<T> {
    /// Leave the current value untouched.
    Keep,
    /// Substitute the given value for the rest of the chain and the caller.
    With(T),
}

impl<T> Replace<T> {
    /// Resolve against the current value.
    pub fn apply(self, current: T) -> T {
        match self {
            Replace::Keep => current,
            Replace::With(next) => next,
        }
    }
}

/// Interception hooks around primitive engine operations.
///
/// Hooks run in the order the middleware was registered, for both the
/// `before` and the `after` phase. Returning an `Err` from any `before_*` or
/// `after_*` hook aborts the operation and surfaces the error to the caller.
///
/// - `before_get` / `before_has`: `Some` short-circuits the driver call. The
///   remaining `before` hooks are skipped but every `after` hook still runs.
/// - `before_set`: `Some` replaces the value that will be persisted; later
///   middleware sees the replacement.
/// - `after_get`: `Replace::With` substitutes the value (or its absence).
/// - `after_has`: `Some` replaces the existence flag.
/// - `before_remove`, `after_set`, `after_remove`: side effects only.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use fuse_core::{HookError, Middleware};
/// use serde_json::Value;
///
/// struct Uppercase;
///
/// #[async_trait]
/// impl Middleware for Uppercase {
///     fn name(&self) -> &str {
///         "uppercase"
///     }
///
///     async fn before_set(&self, _key: &str, value: &Value) -> Result<Option<Value>, HookError> {
///         Ok(value.as_str().map(|s| Value::String(s.to_uppercase())))
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Identifies the middleware in errors and logs.
    fn name(&self) -> &str {
        "middleware"
    }

    async fn before_get(&self, _key: &str) -> Result<Option<Value>, HookError> {
        Ok(None)
    }

    async fn after_get(
        &self,
        _key: &str,
        _value: Option<&Value>,
    ) -> Result<Replace<Option<Value>>, HookError> {
        Ok(Replace::Keep)
    }

    async fn before_set(&self, _key: &str, _value: &Value) -> Result<Option<Value>, HookError> {
        Ok(None)
    }

    async fn after_set(&self, _key: &str, _value: &Value) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_remove(&self, _key: &str) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_remove(&self, _key: &str) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_has(&self, _key: &str) -> Result<Option<bool>, HookError> {
        Ok(None)
    }

    async fn after_has(&self, _key: &str, _exists: bool) -> Result<Option<bool>, HookError> {
        Ok(None)
    }

    /// Best-effort failure notification.
    ///
    /// Called once per failed operation. An `Err` returned here is logged
    /// and discarded; it never replaces the original error and never stops
    /// other middleware from being notified.
    fn on_error(&self, _error: &EngineError) -> Result<(), HookError> {
        Ok(())
    }
}
