// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed view over a FuseDB engine.
//
// Provides a serde-based interface on top of an `Engine`. Values are converted
// to and from `serde_json::Value` and every key is prefixed with a namespace,
// so several logical stores can share one engine without collisions. Reads and
// writes go through the engine's public operations, so middleware sees them.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

/// A namespaced, typed view over an [`Engine`].
///
/// Keys are stored as `"{namespace}:{key}"`.
///
/// # Example
///
/// ```rust
/// use fuse_core::{Engine, TypedStore};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize, PartialEq)]
/// struct User { name: String, age: u32 }
///
/// # tokio_test::block_on(async {
/// let engine = Engine::in_memory();
/// let users = TypedStore::new(&engine, "users").unwrap();
///
/// let alice = User { name: "Alice".into(), age: 30 };
/// users.put("alice", &alice).await.unwrap();
///
/// let retrieved: User = users.get("alice").await.unwrap().unwrap();
/// assert_eq!(retrieved, alice);
/// assert_eq!(engine.keys().await.unwrap(), vec!["users:alice".to_string()]);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TypedStore<'e> {
    engine: &'e Engine,
    namespace: String,
}

impl<'e> TypedStore<'e> {
    /// Create a typed view of `engine` under `namespace`.
    ///
    /// The namespace must be non-empty and must not contain glob
    /// metacharacters (`*`, `?`).
    pub fn new(engine: &'e Engine, namespace: &str) -> EngineResult<Self> {
        if namespace.is_empty() || namespace.contains(['*', '?']) {
            return Err(EngineError::InvalidKey(format!(
                "namespace '{namespace}' must be non-empty and free of '*' and '?'"
            )));
        }
        Ok(Self {
            engine,
            namespace: namespace.to_string(),
        })
    }

    /// The engine this view writes through.
    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    /// The namespace prefix used by this store.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Retrieve and deserialize a value by its logical key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> EngineResult<Option<T>> {
        match self.engine.get(&self.prefixed_key(key)).await? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|err| {
                EngineError::Serialization(format!(
                    "failed to deserialize value for key '{key}': {err}"
                ))
            }),
            None => Ok(None),
        }
    }

    /// Serialize and store a value under the given logical key.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> EngineResult<()> {
        let value = serde_json::to_value(value).map_err(|err| {
            EngineError::Serialization(format!("failed to serialize value for key '{key}': {err}"))
        })?;
        self.engine.set(&self.prefixed_key(key), value).await
    }

    /// Delete a value by its logical key.
    ///
    /// Returns `Ok(true)` if the key existed before the removal.
    pub async fn delete(&self, key: &str) -> EngineResult<bool> {
        let full_key = self.prefixed_key(key);
        let existed = self.engine.has(&full_key).await?;
        self.engine.remove(&full_key).await?;
        Ok(existed)
    }

    /// Whether the logical key is present.
    pub async fn contains(&self, key: &str) -> EngineResult<bool> {
        self.engine.has(&self.prefixed_key(key)).await
    }

    /// Logical keys in this namespace, in engine key order.
    pub async fn keys(&self) -> EngineResult<Vec<String>> {
        let prefix = self.prefix();
        Ok(self
            .engine
            .keys()
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Every entry in this namespace, deserialized.
    pub async fn entries<T: DeserializeOwned>(&self) -> EngineResult<Vec<(String, T)>> {
        let prefix = self.prefix();
        let found = self.engine.find(&format!("{prefix}*")).await?;

        let mut results = Vec::with_capacity(found.len());
        for (full_key, value) in found {
            let logical_key = full_key
                .strip_prefix(&prefix)
                .unwrap_or(&full_key)
                .to_string();
            let value: T = serde_json::from_value(value).map_err(|err| {
                EngineError::Serialization(format!(
                    "failed to deserialize scanned value for key '{logical_key}': {err}"
                ))
            })?;
            results.push((logical_key, value));
        }
        Ok(results)
    }
}
