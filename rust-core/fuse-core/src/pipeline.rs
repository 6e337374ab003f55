// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hook pipeline for FuseDB.
//
// `MiddlewareChain` walks an ordered list of middleware as an explicit fold:
// each phase threads an accumulator (the value, the override, the existence
// flag) through the hooks in registration order. Nothing here touches a
// driver, so ordering and short-circuit rules can be tested on their own.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, EngineResult, HookPhase, Operation};
use crate::middleware::Middleware;

/// An ordered, immutable list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Build a chain from middleware in the order they should run.
    pub fn new(layers: Vec<Arc<dyn Middleware>>) -> Self {
        Self { layers }
    }

    /// Number of middleware in the chain.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True if the chain has no middleware.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Names of the middleware, in order.
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|m| m.name()).collect()
    }

    /// Run `before_get` hooks until one supplies an override.
    pub async fn before_get(&self, key: &str) -> EngineResult<Option<Value>> {
        for m in &self.layers {
            let hit = m
                .before_get(key)
                .await
                .map_err(|e| EngineError::middleware(m.name(), Operation::Get, HookPhase::Before, e))?;
            if hit.is_some() {
                debug!(key, middleware = m.name(), "get short-circuited");
                return Ok(hit);
            }
        }
        Ok(None)
    }

    /// Fold the value through every `after_get` hook.
    pub async fn after_get(&self, key: &str, value: Option<Value>) -> EngineResult<Option<Value>> {
        let mut current = value;
        for m in &self.layers {
            let outcome = m
                .after_get(key, current.as_ref())
                .await
                .map_err(|e| EngineError::middleware(m.name(), Operation::Get, HookPhase::After, e))?;
            current = outcome.apply(current);
        }
        Ok(current)
    }

    /// Fold the value through every `before_set` hook, returning what should be persisted.
    pub async fn before_set(&self, key: &str, value: Value) -> EngineResult<Value> {
        let mut current = value;
        for m in &self.layers {
            let replacement = m
                .before_set(key, &current)
                .await
                .map_err(|e| EngineError::middleware(m.name(), Operation::Set, HookPhase::Before, e))?;
            if let Some(next) = replacement {
                current = next;
            }
        }
        Ok(current)
    }

    /// Notify every `after_set` hook of the persisted value.
    pub async fn after_set(&self, key: &str, value: &Value) -> EngineResult<()> {
        for m in &self.layers {
            m.after_set(key, value)
                .await
                .map_err(|e| EngineError::middleware(m.name(), Operation::Set, HookPhase::After, e))?;
        }
        Ok(())
    }

    /// Run every `before_remove` hook.
    pub async fn before_remove(&self, key: &str) -> EngineResult<()> {
        for m in &self.layers {
            m.before_remove(key).await.map_err(|e| {
                EngineError::middleware(m.name(), Operation::Remove, HookPhase::Before, e)
            })?;
        }
        Ok(())
    }

    /// Run every `after_remove` hook.
    pub async fn after_remove(&self, key: &str) -> EngineResult<()> {
        for m in &self.layers {
            m.after_remove(key).await.map_err(|e| {
                EngineError::middleware(m.name(), Operation::Remove, HookPhase::After, e)
            })?;
        }
        Ok(())
    }

    /// Run `before_has` hooks until one supplies an override.
    pub async fn before_has(&self, key: &str) -> EngineResult<Option<bool>> {
        for m in &self.layers {
            let hit = m
                .before_has(key)
                .await
                .map_err(|e| EngineError::middleware(m.name(), Operation::Has, HookPhase::Before, e))?;
            if hit.is_some() {
                debug!(key, middleware = m.name(), "has short-circuited");
                return Ok(hit);
            }
        }
        Ok(None)
    }

    /// Fold the existence flag through every `after_has` hook.
    pub async fn after_has(&self, key: &str, exists: bool) -> EngineResult<bool> {
        let mut current = exists;
        for m in &self.layers {
            if let Some(next) = m
                .after_has(key, current)
                .await
                .map_err(|e| EngineError::middleware(m.name(), Operation::Has, HookPhase::After, e))?
            {
                current = next;
            }
        }
        Ok(current)
    }

    /// Deliver `error` to every middleware's `on_error`.
    ///
    /// Failures of individual handlers are logged and ignored.
    pub fn notify_error(&self, error: &EngineError) {
        for m in &self.layers {
            if let Err(hook_err) = m.on_error(error) {
                debug!(middleware = m.name(), error = %hook_err, "on_error hook failed");
            }
        }
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("layers", &self.names())
            .finish()
    }
}
