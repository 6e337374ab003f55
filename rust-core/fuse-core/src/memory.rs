// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory driver for FuseDB.
//
// The default driver when an engine is built without one. Entries live in an
// insertion-ordered map wrapped in a tokio `RwLock`. Native snapshots are
// supported (JSON object text); batch writes are not, so bulk operations on
// this driver go through the engine's per-key path and every middleware sees
// each key.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::driver::{ConnectionInfo, Driver, Entries, Snapshot, SnapshotDriver};
use crate::error::DriverError;

/// An in-memory driver backed by an insertion-ordered map.
///
/// All data lives in process memory and is lost on drop. Clones share the
/// same map, which makes it easy to inspect what an engine actually stored.
///
/// # Example
///
/// ```rust
/// use fuse_core::{Driver, InMemoryDriver};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let driver = InMemoryDriver::new();
/// driver.set("hello", json!("world")).await.unwrap();
/// assert_eq!(driver.get("hello").await.unwrap(), Some(json!("world")));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDriver {
    data: Arc<RwLock<Entries>>,
}

impl InMemoryDriver {
    /// Create a new, empty in-memory driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver pre-populated with `entries`.
    pub fn with_entries(entries: Entries) -> Self {
        Self {
            data: Arc::new(RwLock::new(entries)),
        }
    }

    /// Return a copy of the raw stored entries, bypassing any middleware.
    pub async fn raw_entries(&self) -> Entries {
        self.data.read().await.clone()
    }
}

#[async_trait]
impl Driver for InMemoryDriver {
    async fn connect(&self) -> Result<ConnectionInfo, DriverError> {
        Ok(ConnectionInfo::new(self.name()))
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, DriverError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), DriverError> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DriverError> {
        self.data.write().await.shift_remove(key);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, DriverError> {
        Ok(self.data.read().await.contains_key(key))
    }

    async fn size(&self) -> Result<usize, DriverError> {
        Ok(self.data.read().await.len())
    }

    async fn keys(&self) -> Result<Vec<String>, DriverError> {
        Ok(self.data.read().await.keys().cloned().collect())
    }

    async fn values(&self) -> Result<Vec<Value>, DriverError> {
        Ok(self.data.read().await.values().cloned().collect())
    }

    async fn clear(&self) -> Result<(), DriverError> {
        self.data.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }

    fn snapshots(&self) -> Option<&dyn SnapshotDriver> {
        Some(self)
    }
}

#[async_trait]
impl SnapshotDriver for InMemoryDriver {
    async fn export_snapshot(&self) -> Result<Snapshot, DriverError> {
        let map = self.data.read().await;
        Ok(Snapshot::from(serde_json::to_string(&*map)?))
    }

    async fn import_snapshot(&self, snapshot: &Snapshot) -> Result<(), DriverError> {
        let parsed: Value = serde_json::from_slice(snapshot.as_bytes())?;
        let Value::Object(entries) = parsed else {
            return Err(DriverError::Corrupted(
                "snapshot is not a JSON object".to_string(),
            ));
        };
        if entries.contains_key("") {
            return Err(DriverError::Corrupted(
                "snapshot contains an empty key".to_string(),
            ));
        }
        *self.data.write().await = entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_basic_crud() {
        let driver = InMemoryDriver::new();

        // Initially empty.
        assert_eq!(driver.size().await.unwrap(), 0);
        assert_eq!(driver.get("key1").await.unwrap(), None);
        assert!(!driver.has("key1").await.unwrap());

        // Set and get.
        driver.set("key1", json!("value1")).await.unwrap();
        assert_eq!(driver.get("key1").await.unwrap(), Some(json!("value1")));
        assert!(driver.has("key1").await.unwrap());
        assert_eq!(driver.size().await.unwrap(), 1);

        // Overwrite.
        driver.set("key1", json!({"n": 2})).await.unwrap();
        assert_eq!(driver.get("key1").await.unwrap(), Some(json!({"n": 2})));
        assert_eq!(driver.size().await.unwrap(), 1);

        // Remove existing and missing keys.
        driver.remove("key1").await.unwrap();
        assert_eq!(driver.get("key1").await.unwrap(), None);
        driver.remove("nonexistent").await.unwrap();
        assert_eq!(driver.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_null_is_distinct_from_absent() {
        let driver = InMemoryDriver::new();
        driver.set("nothing", Value::Null).await.unwrap();
        assert_eq!(driver.get("nothing").await.unwrap(), Some(Value::Null));
        assert!(driver.has("nothing").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_and_values_follow_insertion_order() {
        let driver = InMemoryDriver::new();
        driver.set("zeta", json!(1)).await.unwrap();
        driver.set("alpha", json!(2)).await.unwrap();
        driver.set("mid", json!(3)).await.unwrap();
        driver.remove("alpha").await.unwrap();

        assert_eq!(driver.keys().await.unwrap(), vec!["zeta", "mid"]);
        assert_eq!(driver.values().await.unwrap(), vec![json!(1), json!(3)]);
    }

    #[tokio::test]
    async fn test_clear() {
        let driver = InMemoryDriver::new();
        driver.set("a", json!(1)).await.unwrap();
        driver.set("b", json!(2)).await.unwrap();
        driver.clear().await.unwrap();
        assert_eq!(driver.size().await.unwrap(), 0);
        assert!(driver.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_native_snapshot_round_trip() {
        let driver = InMemoryDriver::new();
        driver.set("a", json!(1)).await.unwrap();
        driver.set("b", json!([true, null])).await.unwrap();

        let snapshots = driver.snapshots().unwrap();
        let snap = snapshots.export_snapshot().await.unwrap();
        driver.clear().await.unwrap();
        snapshots.import_snapshot(&snap).await.unwrap();

        assert_eq!(driver.get("a").await.unwrap(), Some(json!(1)));
        assert_eq!(driver.get("b").await.unwrap(), Some(json!([true, null])));
    }

    #[tokio::test]
    async fn test_import_rejects_non_object_snapshot() {
        let driver = InMemoryDriver::new();
        let snapshots = driver.snapshots().unwrap();
        let err = snapshots
            .import_snapshot(&Snapshot::from(String::from("[1,2]")))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Corrupted(_)));
    }

    #[tokio::test]
    async fn test_import_rejects_empty_key() {
        let driver = InMemoryDriver::new();
        driver.set("keep", json!(1)).await.unwrap();

        let err = driver
            .snapshots()
            .unwrap()
            .import_snapshot(&Snapshot::from(String::from(r#"{"": 1, "a": 2}"#)))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Corrupted(_)));
        assert_eq!(driver.keys().await.unwrap(), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_no_bulk_capability() {
        assert!(InMemoryDriver::new().bulk().is_none());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let driver = InMemoryDriver::new();
        let clone = driver.clone();

        driver.set("shared", json!("data")).await.unwrap();
        assert_eq!(clone.get("shared").await.unwrap(), Some(json!("data")));
        assert_eq!(clone.raw_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_reports_name() {
        let info = InMemoryDriver::new().connect().await.unwrap();
        assert_eq!(info.driver, "in-memory");
    }
}
