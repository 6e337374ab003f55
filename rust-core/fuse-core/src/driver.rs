// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core driver contract for FuseDB.
//
// Defines the `Driver` trait that every storage backend implements. The trait
// is the minimal key-value surface the engine needs; everything else (bulk
// reads, pattern search, sampling, snapshots) is derived by the engine. Two
// optional capabilities, batch writes and native snapshots, are exposed through
// accessor methods that return `None` unless the driver opts in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DriverError;

/// An ordered key → value mapping.
///
/// Iteration order is insertion order, so mappings built by the engine follow
/// the order reported by [`Driver::keys`].
pub type Entries = Map<String, Value>;

/// Information reported by a driver when a session is established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Human-readable driver name, e.g. `"in-memory"`.
    pub driver: String,
    /// Driver-specific details (file path, server version, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl ConnectionInfo {
    /// Create connection info for the named driver with no details.
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            details: Map::new(),
        }
    }

    /// Attach a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// An opaque, fully serialized copy of a store.
///
/// The encoding is chosen by whoever produced it: a driver with native
/// snapshot support uses its own format, the engine fallback uses a JSON
/// object. The only guarantee is that a snapshot can be fed back to the same
/// kind of engine/driver pair that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Vec<u8>,
}

impl Snapshot {
    /// Wrap raw snapshot bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the snapshot, returning the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Interpret the snapshot as UTF-8 text, if it is.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Size of the snapshot in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the snapshot holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<String> for Snapshot {
    fn from(text: String) -> Self {
        Self::from_bytes(text.into_bytes())
    }
}

impl From<Vec<u8>> for Snapshot {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

/// A pluggable key-value storage backend.
///
/// Keys are non-empty strings; values are arbitrary JSON values. `get`
/// returns `Ok(None)` for a missing key, which is distinct from a stored
/// `Value::Null`.
///
/// Implementations must be safe to share across threads and tokio tasks.
/// Per-key atomicity is the driver's responsibility; the engine adds no
/// locking of its own.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Establish the session.
    ///
    /// Calling this more than once is backend-defined.
    async fn connect(&self) -> Result<ConnectionInfo, DriverError>;

    /// Release the session. A no-op if the driver was never connected.
    async fn disconnect(&self) -> Result<(), DriverError>;

    /// Retrieve the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Value>, DriverError>;

    /// Store `value` under `key`, creating or overwriting it.
    async fn set(&self, key: &str, value: Value) -> Result<(), DriverError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), DriverError>;

    /// Check whether `key` exists.
    async fn has(&self, key: &str) -> Result<bool, DriverError>;

    /// Number of stored entries.
    async fn size(&self) -> Result<usize, DriverError>;

    /// All keys, each exactly once, in backend-defined order.
    async fn keys(&self) -> Result<Vec<String>, DriverError>;

    /// All values, aligned with the order returned by [`Driver::keys`].
    async fn values(&self) -> Result<Vec<Value>, DriverError>;

    /// Remove every entry.
    async fn clear(&self) -> Result<(), DriverError>;

    /// A human-readable name for this driver, used in logging and errors.
    fn name(&self) -> &str;

    /// Backend-optimized batch writes, if the driver supports them.
    fn bulk(&self) -> Option<&dyn BulkDriver> {
        None
    }

    /// Native snapshot export/import, if the driver supports it.
    fn snapshots(&self) -> Option<&dyn SnapshotDriver> {
        None
    }
}

/// Optional batch-write capability of a [`Driver`].
#[async_trait]
pub trait BulkDriver: Send + Sync {
    /// Write every entry. Atomicity across entries is backend-defined.
    async fn bulk_set(&self, entries: &Entries) -> Result<(), DriverError>;

    /// Remove every listed key; missing keys are ignored.
    async fn bulk_remove(&self, keys: &[String]) -> Result<(), DriverError>;
}

/// Optional native snapshot capability of a [`Driver`].
#[async_trait]
pub trait SnapshotDriver: Send + Sync {
    /// Serialize the whole store.
    async fn export_snapshot(&self) -> Result<Snapshot, DriverError>;

    /// Replace the whole store with the contents of `snapshot`.
    ///
    /// A snapshot holding an empty key must be refused without touching the
    /// store; the engine cannot read such a key back.
    async fn import_snapshot(&self, snapshot: &Snapshot) -> Result<(), DriverError>;
}
