// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>
//
// redb-backed persistent driver for FuseDB.
//
// Uses redb (pure Rust, B-tree, ACID, single-file database) for durable
// storage. Values are stored as their JSON encoding.
//
// # Design
//
// - Single redb `Database` file containing one table keyed by string.
// - Every call runs on the blocking pool; reads use read transactions,
//   mutations use write transactions (serialised by redb internally).
// - A missing table means nothing has been written yet and reads as empty.
// - `clear` drops the table; the next write recreates it.
// - Keys come back in lexicographic order, not insertion order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fuse_core::{BulkDriver, ConnectionInfo, Driver, DriverError, Entries};
use redb::{
    Database, ReadOnlyTable, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, TableError, WriteTransaction,
};
use serde_json::Value;
use tracing::debug;

/// Table holding every entry: key to JSON-encoded value.
const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// A persistent driver powered by redb.
///
/// # Example
///
/// ```rust,no_run
/// use fuse_core::Driver;
/// use fuse_drivers::RedbDriver;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let driver = RedbDriver::open("/tmp/fusedb.redb").unwrap();
/// driver.set("hello", json!("world")).await.unwrap();
/// assert_eq!(driver.get("hello").await.unwrap(), Some(json!("world")));
/// # });
/// ```
pub struct RedbDriver {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbDriver {
    /// Open or create a redb database at the given path.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path).map_err(|e| {
            DriverError::Unavailable(format!("failed to open redb at {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), "opened redb driver");

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Return the filesystem path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a read-only closure against the entries table on the blocking pool.
    ///
    /// The closure receives `None` when the table has never been created.
    async fn read<T, F>(&self, f: F) -> Result<T, DriverError>
    where
        T: Send + 'static,
        F: FnOnce(Option<ReadOnlyTable<&'static str, &'static [u8]>>) -> Result<T, DriverError>
            + Send
            + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| DriverError::Unavailable(format!("read txn: {e}")))?;
            match txn.open_table(ENTRIES) {
                Ok(table) => f(Some(table)),
                Err(TableError::TableDoesNotExist(_)) => f(None),
                Err(e) => Err(DriverError::Corrupted(format!("open table: {e}"))),
            }
        })
        .await
        .map_err(|e| DriverError::Unavailable(format!("task join: {e}")))?
    }

    /// Run a mutating closure in one write transaction on the blocking pool.
    async fn write<F>(&self, f: F) -> Result<(), DriverError>
    where
        F: FnOnce(&WriteTransaction) -> Result<(), DriverError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| DriverError::Unavailable(format!("write txn: {e}")))?;
            f(&txn)?;
            txn.commit()
                .map_err(|e| DriverError::Corrupted(format!("commit: {e}")))
        })
        .await
        .map_err(|e| DriverError::Unavailable(format!("task join: {e}")))?
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<Value, DriverError> {
    serde_json::from_slice(bytes)
        .map_err(|e| DriverError::Corrupted(format!("value for '{key}' is not JSON: {e}")))
}

fn insert_all(txn: &WriteTransaction, entries: &[(String, Vec<u8>)]) -> Result<(), DriverError> {
    let mut table = txn
        .open_table(ENTRIES)
        .map_err(|e| DriverError::Unavailable(format!("open table: {e}")))?;
    for (key, bytes) in entries {
        table
            .insert(key.as_str(), bytes.as_slice())
            .map_err(|e| DriverError::Corrupted(format!("insert: {e}")))?;
    }
    Ok(())
}

fn remove_all(txn: &WriteTransaction, keys: &[String]) -> Result<(), DriverError> {
    let mut table = txn
        .open_table(ENTRIES)
        .map_err(|e| DriverError::Unavailable(format!("open table: {e}")))?;
    for key in keys {
        table
            .remove(key.as_str())
            .map_err(|e| DriverError::Corrupted(format!("remove: {e}")))?;
    }
    Ok(())
}

impl std::fmt::Debug for RedbDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDriver")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl Driver for RedbDriver {
    async fn connect(&self) -> Result<ConnectionInfo, DriverError> {
        Ok(ConnectionInfo::new(self.name()).with_detail("path", self.path.display().to_string()))
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        // Every commit is durable; nothing is buffered.
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, DriverError> {
        let key = key.to_string();
        self.read(move |table| {
            let Some(table) = table else {
                return Ok(None);
            };
            match table.get(key.as_str()) {
                Ok(Some(bytes)) => decode(&key, bytes.value()).map(Some),
                Ok(None) => Ok(None),
                Err(e) => Err(DriverError::Corrupted(format!("get: {e}"))),
            }
        })
        .await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), DriverError> {
        let entry = vec![(key.to_string(), serde_json::to_vec(&value)?)];
        self.write(move |txn| insert_all(txn, &entry)).await
    }

    async fn remove(&self, key: &str) -> Result<(), DriverError> {
        let keys = vec![key.to_string()];
        self.write(move |txn| remove_all(txn, &keys)).await
    }

    async fn has(&self, key: &str) -> Result<bool, DriverError> {
        let key = key.to_string();
        self.read(move |table| match table {
            Some(table) => table
                .get(key.as_str())
                .map(|v| v.is_some())
                .map_err(|e| DriverError::Corrupted(format!("has: {e}"))),
            None => Ok(false),
        })
        .await
    }

    async fn size(&self) -> Result<usize, DriverError> {
        self.read(|table| match table {
            Some(table) => table
                .len()
                .map(|n| n as usize)
                .map_err(|e| DriverError::Corrupted(format!("len: {e}"))),
            None => Ok(0),
        })
        .await
    }

    async fn keys(&self) -> Result<Vec<String>, DriverError> {
        self.read(|table| {
            let Some(table) = table else {
                return Ok(Vec::new());
            };
            let iter = table
                .iter()
                .map_err(|e| DriverError::Corrupted(format!("scan: {e}")))?;
            let mut keys = Vec::new();
            for entry in iter {
                let (k, _) = entry.map_err(|e| DriverError::Corrupted(format!("scan entry: {e}")))?;
                keys.push(k.value().to_string());
            }
            Ok(keys)
        })
        .await
    }

    async fn values(&self) -> Result<Vec<Value>, DriverError> {
        self.read(|table| {
            let Some(table) = table else {
                return Ok(Vec::new());
            };
            let iter = table
                .iter()
                .map_err(|e| DriverError::Corrupted(format!("scan: {e}")))?;
            let mut values = Vec::new();
            for entry in iter {
                let (k, v) = entry.map_err(|e| DriverError::Corrupted(format!("scan entry: {e}")))?;
                values.push(decode(k.value(), v.value())?);
            }
            Ok(values)
        })
        .await
    }

    async fn clear(&self) -> Result<(), DriverError> {
        self.write(|txn| {
            txn.delete_table(ENTRIES)
                .map(|_| ())
                .map_err(|e| DriverError::Corrupted(format!("clear: {e}")))
        })
        .await
    }

    fn name(&self) -> &str {
        "redb"
    }

    fn bulk(&self) -> Option<&dyn BulkDriver> {
        Some(self)
    }
}

#[async_trait]
impl BulkDriver for RedbDriver {
    async fn bulk_set(&self, entries: &Entries) -> Result<(), DriverError> {
        let owned = entries
            .iter()
            .map(|(k, v)| Ok((k.clone(), serde_json::to_vec(v)?)))
            .collect::<Result<Vec<_>, DriverError>>()?;
        self.write(move |txn| insert_all(txn, &owned)).await
    }

    async fn bulk_remove(&self, keys: &[String]) -> Result<(), DriverError> {
        let owned = keys.to_vec();
        self.write(move |txn| remove_all(txn, &owned)).await
    }
}
