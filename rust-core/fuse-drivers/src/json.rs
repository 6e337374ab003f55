// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON-file driver for FuseDB.
//
// Keeps the whole store in memory as one insertion-ordered JSON object and
// mirrors it to a single pretty-printed file. With autosave on (the default)
// every mutation rewrites the file before returning; with it off, callers
// flush explicitly via `save()`.
//
// # Design
//
// - The file is read once in `open`. A missing file is created empty; an
//   unreadable or malformed file is logged and the store starts empty.
// - Writes go to a sibling `.tmp` file which is then renamed over the target,
//   so a crash mid-save never leaves a truncated store behind.
// - Saves happen while the write lock is held, so the file always reflects
//   a prefix of the mutation order.
// - With autosave on, a mutation is applied to a copy which replaces the
//   live map only after the file write succeeds. A failed save leaves both
//   memory and disk at the previous state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fuse_core::{BulkDriver, ConnectionInfo, Driver, DriverError, Entries};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Options for [`JsonFileDriver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonFileOptions {
    /// Path to the JSON file.
    pub path: PathBuf,
    /// Persist after every mutation.
    #[serde(default = "default_autosave")]
    pub autosave: bool,
}

fn default_autosave() -> bool {
    true
}

impl JsonFileOptions {
    /// Options for `path` with autosave enabled.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            autosave: true,
        }
    }

    /// Toggle autosave.
    pub fn autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }
}

/// A driver that stores every entry in one JSON object file.
///
/// # Example
///
/// ```rust,no_run
/// use fuse_core::Engine;
/// use fuse_drivers::JsonFileDriver;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let driver = JsonFileDriver::open("/tmp/fusedb.json").await.unwrap();
/// let engine = Engine::builder().with_driver(driver).build().unwrap();
///
/// engine.connect().await.unwrap();
/// engine.set("greeting", json!("hello")).await.unwrap();
/// # });
/// ```
#[derive(Debug)]
pub struct JsonFileDriver {
    path: PathBuf,
    autosave: bool,
    data: RwLock<Entries>,
}

impl JsonFileDriver {
    /// Open or create the file at `path` with autosave enabled.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        Self::with_options(JsonFileOptions::new(path.as_ref())).await
    }

    /// Open or create the file described by `options`.
    pub async fn with_options(options: JsonFileOptions) -> Result<Self, DriverError> {
        let path = options.path;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let driver = Self {
            data: RwLock::new(Entries::new()),
            autosave: options.autosave,
            path,
        };

        match tokio::fs::read(&driver.path).await {
            Ok(bytes) => {
                let loaded = parse_store(&bytes).unwrap_or_else(|reason| {
                    warn!(path = %driver.path.display(), %reason, "failed to load JSON store; starting empty");
                    Entries::new()
                });
                debug!(path = %driver.path.display(), entries = loaded.len(), "loaded JSON store");
                *driver.data.write().await = loaded;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %driver.path.display(), "creating empty JSON store");
                driver.write_file(&Entries::new()).await?;
            }
            Err(err) => {
                warn!(path = %driver.path.display(), error = %err, "failed to read JSON store; starting empty");
            }
        }

        Ok(driver)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether mutations are persisted immediately.
    pub fn autosave(&self) -> bool {
        self.autosave
    }

    /// Write the current contents to disk.
    pub async fn save(&self) -> Result<(), DriverError> {
        let data = self.data.read().await;
        self.write_file(&data).await
    }

    /// Apply `change` under the write lock, persisting first when autosave is on.
    async fn mutate<F>(&self, change: F) -> Result<(), DriverError>
    where
        F: FnOnce(&mut Entries) + Send,
    {
        let mut data = self.data.write().await;
        if !self.autosave {
            change(&mut data);
            return Ok(());
        }
        let mut next = data.clone();
        change(&mut next);
        self.write_file(&next).await?;
        *data = next;
        Ok(())
    }

    async fn write_file(&self, data: &Entries) -> Result<(), DriverError> {
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn parse_store(bytes: &[u8]) -> Result<Entries, String> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(entries)) => Ok(entries),
        Ok(_) => Err("top-level value is not an object".to_string()),
        Err(err) => Err(err.to_string()),
    }
}

#[async_trait]
impl Driver for JsonFileDriver {
    async fn connect(&self) -> Result<ConnectionInfo, DriverError> {
        Ok(ConnectionInfo::new(self.name())
            .with_detail("path", self.path.display().to_string())
            .with_detail("autosave", self.autosave))
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, DriverError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), DriverError> {
        self.mutate(|data| {
            data.insert(key.to_string(), value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), DriverError> {
        self.mutate(|data| {
            data.shift_remove(key);
        })
        .await
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
        self.mutate(|data| data.clear()).await
    }

    fn name(&self) -> &str {
        "json-file"
    }

    fn bulk(&self) -> Option<&dyn BulkDriver> {
        Some(self)
    }
}

#[async_trait]
impl BulkDriver for JsonFileDriver {
    async fn bulk_set(&self, entries: &Entries) -> Result<(), DriverError> {
        self.mutate(|data| {
            for (key, value) in entries {
                data.insert(key.clone(), value.clone());
            }
        })
        .await
    }

    async fn bulk_remove(&self, keys: &[String]) -> Result<(), DriverError> {
        self.mutate(|data| {
            for key in keys {
                data.shift_remove(key);
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn read_file(path: &Path) -> Value {
        serde_json::from_slice(&tokio::fs::read(path).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_created_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let driver = JsonFileDriver::open(&path).await.unwrap();
        assert_eq!(driver.size().await.unwrap(), 0);
        assert_eq!(read_file(&path).await, json!({}));
    }

    #[tokio::test]
    async fn test_autosave_persists_each_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let driver = JsonFileDriver::open(&path).await.unwrap();

        driver.set("a", json!(1)).await.unwrap();
        driver.set("b", json!({"x": true})).await.unwrap();
        assert_eq!(read_file(&path).await, json!({"a": 1, "b": {"x": true}}));

        driver.remove("a").await.unwrap();
        assert_eq!(read_file(&path).await, json!({"b": {"x": true}}));

        driver.clear().await.unwrap();
        assert_eq!(read_file(&path).await, json!({}));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_manual_save_when_autosave_off() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let driver = JsonFileDriver::with_options(JsonFileOptions::new(&path).autosave(false))
            .await
            .unwrap();
        assert!(!driver.autosave());

        driver.set("k", json!("v")).await.unwrap();
        assert_eq!(read_file(&path).await, json!({}));

        driver.save().await.unwrap();
        assert_eq!(read_file(&path).await, json!({"k": "v"}));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let store_dir = dir.path().join("gone");
        let driver = JsonFileDriver::open(store_dir.join("store.json")).await.unwrap();
        driver.set("kept", json!(1)).await.unwrap();

        // Every later save fails: the directory no longer exists.
        tokio::fs::remove_dir_all(&store_dir).await.unwrap();

        assert!(matches!(
            driver.set("lost", json!(2)).await,
            Err(DriverError::Io(_))
        ));
        assert_eq!(driver.get("lost").await.unwrap(), None);

        let mut batch = Entries::new();
        batch.insert("lost".into(), json!(3));
        assert!(driver.bulk_set(&batch).await.is_err());
        assert!(driver.remove("kept").await.is_err());
        assert!(driver.clear().await.is_err());

        assert_eq!(driver.keys().await.unwrap(), vec!["kept"]);
        assert_eq!(driver.get("kept").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_reopen_preserves_insertion_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let driver = JsonFileDriver::open(&path).await.unwrap();
            for key in ["zeta", "alpha", "mid"] {
                driver.set(key, json!(key)).await.unwrap();
            }
        }

        let driver = JsonFileDriver::open(&path).await.unwrap();
        assert_eq!(driver.keys().await.unwrap(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(driver.get("mid").await.unwrap(), Some(json!("mid")));
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let driver = JsonFileDriver::open(&path).await.unwrap();
        assert_eq!(driver.size().await.unwrap(), 0);

        tokio::fs::write(&path, b"[1, 2]").await.unwrap();
        let driver = JsonFileDriver::open(&path).await.unwrap();
        assert_eq!(driver.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bulk_writes_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let driver = JsonFileDriver::open(&path).await.unwrap();

        let mut entries = Entries::new();
        entries.insert("a".into(), json!(1));
        entries.insert("b".into(), json!(2));
        entries.insert("c".into(), json!(3));
        driver.bulk_set(&entries).await.unwrap();
        driver
            .bulk_remove(&["b".to_string(), "missing".to_string()])
            .await
            .unwrap();

        assert_eq!(read_file(&path).await, json!({"a": 1, "c": 3}));
    }

    #[tokio::test]
    async fn test_connection_info_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let driver = JsonFileDriver::open(&path).await.unwrap();

        let info = driver.connect().await.unwrap();
        assert_eq!(info.driver, "json-file");
        assert_eq!(info.details["path"], json!(path.display().to_string()));
        assert_eq!(info.details["autosave"], json!(true));
    }

    #[test]
    fn test_options_deserialize_with_default_autosave() {
        let options: JsonFileOptions = serde_json::from_str(r#"{"path": "db.json"}"#).unwrap();
        assert_eq!(options, JsonFileOptions::new("db.json"));
    }
}
