// SPDX-License-Identifier: PMPL-1.0-or-later
//! The FuseDB engine.
//!
//! Binds exactly one [`Driver`] to an ordered [`MiddlewareChain`] and exposes
//! the public key-value surface. The four primitives (`get`, `set`, `remove`,
//! `has`) pass through the middleware hooks; `size`, `keys`, `values` and
//! `clear` go straight to the driver. Every other operation is derived from
//! those calls and never reaches into driver internals.
//!
//! Any failure, whether raised by the driver, a hook, or the engine's own
//! validation, is handed to every middleware's `on_error`, published as a
//! [`LifecycleEvent::Error`], and then returned to the caller.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use rand::Rng;
use serde_json::{Number, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::{EngineConfig, EngineSettings};
use crate::driver::{ConnectionInfo, Driver, Entries, Snapshot};
use crate::error::{EngineError, EngineResult, Operation};
use crate::events::{EventBus, LifecycleEvent, Subscription};
use crate::memory::InMemoryDriver;
use crate::pattern::GlobPattern;
use crate::pipeline::MiddlewareChain;

/// Result of [`Engine::random`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// One single-entry mapping, or `None` for an empty store.
    Single(Option<Entries>),
    /// Up to `count` single-entry mappings for distinct keys.
    Many(Vec<Entries>),
}

impl Sample {
    /// Number of sampled entries.
    pub fn len(&self) -> usize {
        match self {
            Sample::Single(entry) => usize::from(entry.is_some()),
            Sample::Many(entries) => entries.len(),
        }
    }

    /// True if nothing was sampled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a list of single-entry mappings.
    pub fn into_entries(self) -> Vec<Entries> {
        match self {
            Sample::Single(entry) => entry.into_iter().collect(),
            Sample::Many(entries) => entries,
        }
    }
}

/// Storage-agnostic key-value engine.
///
/// The engine holds no data of its own and takes no locks; concurrent calls
/// are ordered only as far as the driver orders them.
///
/// # Example
///
/// ```rust
/// use fuse_core::Engine;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let engine = Engine::in_memory();
/// engine.connect().await.unwrap();
///
/// engine.set("foo", json!(42)).await.unwrap();
/// assert_eq!(engine.get("foo").await.unwrap(), Some(json!(42)));
/// assert!(engine.has("foo").await.unwrap());
///
/// engine.disconnect().await.unwrap();
/// # });
/// ```
pub struct Engine {
    driver: Arc<dyn Driver>,
    chain: MiddlewareChain,
    events: EventBus,
    settings: EngineSettings,
    connected: AtomicBool,
}

impl Engine {
    /// Build an engine from `config`.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.settings.validate()?;

        let driver = config
            .driver
            .unwrap_or_else(|| Arc::new(InMemoryDriver::new()));
        let events = config
            .events
            .unwrap_or_else(|| EventBus::new(config.settings.event_capacity));

        debug!(
            driver = driver.name(),
            middleware = config.middleware.len(),
            "engine constructed"
        );

        Ok(Self {
            driver,
            chain: MiddlewareChain::new(config.middleware),
            events,
            settings: config.settings,
            connected: AtomicBool::new(false),
        })
    }

    /// An engine over a fresh in-memory driver with no middleware.
    pub fn in_memory() -> Self {
        Self {
            driver: Arc::new(InMemoryDriver::new()),
            chain: MiddlewareChain::default(),
            events: EventBus::default(),
            settings: EngineSettings::default(),
            connected: AtomicBool::new(false),
        }
    }

    /// Start a configuration; finish it with [`EngineConfig::build`].
    pub fn builder() -> EngineConfig {
        EngineConfig::default()
    }

    /// The bound driver.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// The middleware chain.
    pub fn middleware(&self) -> &MiddlewareChain {
        &self.chain
    }

    /// The lifecycle event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Shorthand for `self.events().subscribe()`.
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// The settings the engine was built with.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Whether the last `connect` succeeded and no `disconnect` followed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the driver session and emit [`LifecycleEvent::Connected`].
    #[instrument(skip_all, fields(driver = %self.driver.name()))]
    pub async fn connect(&self) -> EngineResult<ConnectionInfo> {
        match self.driver.connect().await {
            Ok(info) => {
                self.connected.store(true, Ordering::Release);
                info!("connected");
                self.events.emit(LifecycleEvent::Connected(info.clone()));
                Ok(info)
            }
            Err(source) => self.fail(EngineError::Connection {
                driver: self.driver.name().to_string(),
                op: Operation::Connect,
                source,
            }),
        }
    }

    /// Release the driver session and emit [`LifecycleEvent::Disconnected`].
    #[instrument(skip_all, fields(driver = %self.driver.name()))]
    pub async fn disconnect(&self) -> EngineResult<()> {
        match self.driver.disconnect().await {
            Ok(()) => {
                self.connected.store(false, Ordering::Release);
                info!("disconnected");
                self.events.emit(LifecycleEvent::Disconnected);
                Ok(())
            }
            Err(source) => self.fail(EngineError::Connection {
                driver: self.driver.name().to_string(),
                op: Operation::Disconnect,
                source,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Intercepted primitives
    // ------------------------------------------------------------------

    /// Read `key` through the middleware chain.
    ///
    /// `Ok(None)` means the key is absent.
    pub async fn get(&self, key: &str) -> EngineResult<Option<Value>> {
        let result = async {
            self.admit_key(Operation::Get, key)?;
            let value = match self.chain.before_get(key).await? {
                Some(shortcut) => Some(shortcut),
                None => self
                    .driver
                    .get(key)
                    .await
                    .map_err(|e| EngineError::driver(Operation::Get, e))?,
            };
            self.chain.after_get(key, value).await
        }
        .await;
        self.observed(result)
    }

    /// Store `value` under `key` through the middleware chain.
    pub async fn set(&self, key: &str, value: Value) -> EngineResult<()> {
        let result = async {
            self.admit_key(Operation::Set, key)?;
            let value = self.chain.before_set(key, value).await?;
            self.driver
                .set(key, value.clone())
                .await
                .map_err(|e| EngineError::driver(Operation::Set, e))?;
            self.chain.after_set(key, &value).await
        }
        .await;
        self.observed(result)
    }

    /// Remove `key` through the middleware chain. Missing keys are fine.
    pub async fn remove(&self, key: &str) -> EngineResult<()> {
        let result = async {
            self.admit_key(Operation::Remove, key)?;
            self.chain.before_remove(key).await?;
            self.driver
                .remove(key)
                .await
                .map_err(|e| EngineError::driver(Operation::Remove, e))?;
            self.chain.after_remove(key).await
        }
        .await;
        self.observed(result)
    }

    /// Check for `key` through the middleware chain.
    pub async fn has(&self, key: &str) -> EngineResult<bool> {
        let result = async {
            self.admit_key(Operation::Has, key)?;
            let exists = match self.chain.before_has(key).await? {
                Some(shortcut) => shortcut,
                None => self
                    .driver
                    .has(key)
                    .await
                    .map_err(|e| EngineError::driver(Operation::Has, e))?,
            };
            self.chain.after_has(key, exists).await
        }
        .await;
        self.observed(result)
    }

    // ------------------------------------------------------------------
    // Pass-through primitives (not intercepted by middleware)
    // ------------------------------------------------------------------

    /// Number of stored entries.
    pub async fn size(&self) -> EngineResult<usize> {
        let result = async {
            self.admit(Operation::Size)?;
            self.driver
                .size()
                .await
                .map_err(|e| EngineError::driver(Operation::Size, e))
        }
        .await;
        self.observed(result)
    }

    /// All keys in driver order.
    pub async fn keys(&self) -> EngineResult<Vec<String>> {
        let result = async {
            self.admit(Operation::Keys)?;
            self.driver
                .keys()
                .await
                .map_err(|e| EngineError::driver(Operation::Keys, e))
        }
        .await;
        self.observed(result)
    }

    /// All raw stored values in driver order.
    pub async fn values(&self) -> EngineResult<Vec<Value>> {
        let result = async {
            self.admit(Operation::Values)?;
            self.driver
                .values()
                .await
                .map_err(|e| EngineError::driver(Operation::Values, e))
        }
        .await;
        self.observed(result)
    }

    /// Remove every entry.
    pub async fn clear(&self) -> EngineResult<()> {
        let result = async {
            self.admit(Operation::Clear)?;
            self.driver
                .clear()
                .await
                .map_err(|e| EngineError::driver(Operation::Clear, e))
        }
        .await;
        self.observed(result)
    }

    // ------------------------------------------------------------------
    // Derived operations
    // ------------------------------------------------------------------

    /// Read several keys concurrently.
    ///
    /// The result is positionally aligned with `keys`; missing keys yield
    /// `None`. Every read runs to completion before the first error, if
    /// any, is returned.
    pub async fn bulk_get<K: AsRef<str>>(&self, keys: &[K]) -> EngineResult<Vec<Option<Value>>> {
        join_all(keys.iter().map(|key| self.get(key.as_ref())))
            .await
            .into_iter()
            .collect()
    }

    /// Write several entries.
    ///
    /// Every key is validated before anything is written. Uses the driver's
    /// batch path when it has one (middleware is not consulted); otherwise
    /// calls [`Engine::set`] for each entry in order.
    pub async fn bulk_set(&self, entries: Entries) -> EngineResult<()> {
        self.observed(admit_keys(Operation::BulkSet, entries.keys()))?;
        if let Some(bulk) = self.driver.bulk() {
            let result = async {
                self.admit(Operation::BulkSet)?;
                bulk.bulk_set(&entries)
                    .await
                    .map_err(|e| EngineError::driver(Operation::BulkSet, e))
            }
            .await;
            return self.observed(result);
        }

        debug!(driver = self.driver.name(), "no bulk capability; setting per key");
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    /// Remove several keys.
    ///
    /// Every key is validated before anything is removed. Uses the driver's
    /// batch path when it has one; otherwise calls [`Engine::remove`] for
    /// each key in order.
    pub async fn bulk_remove<K: AsRef<str>>(&self, keys: &[K]) -> EngineResult<()> {
        self.observed(admit_keys(Operation::BulkRemove, keys))?;
        if let Some(bulk) = self.driver.bulk() {
            let owned: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
            let result = async {
                self.admit(Operation::BulkRemove)?;
                bulk.bulk_remove(&owned)
                    .await
                    .map_err(|e| EngineError::driver(Operation::BulkRemove, e))
            }
            .await;
            return self.observed(result);
        }

        debug!(driver = self.driver.name(), "no bulk capability; removing per key");
        for key in keys {
            self.remove(key.as_ref()).await?;
        }
        Ok(())
    }

    /// Entries whose key matches the glob `pattern` (`*` and `?`).
    ///
    /// Keys are taken from one `keys()` call; each match is then read with
    /// [`Engine::get`], one at a time.
    pub async fn find(&self, pattern: &str) -> EngineResult<Entries> {
        let glob = self.observed(GlobPattern::new(pattern))?;
        let mut found = Entries::new();
        for key in self.readable_keys().await? {
            if !glob.matches(&key) {
                continue;
            }
            if let Some(value) = self.get(&key).await? {
                found.insert(key, value);
            }
        }
        Ok(found)
    }

    /// Entries for which `predicate(key, value)` holds, in `keys()` order.
    ///
    /// The scan is not isolated: writes that land while it runs may or may
    /// not be observed.
    pub async fn filter<F>(&self, mut predicate: F) -> EngineResult<Entries>
    where
        F: FnMut(&str, &Value) -> bool,
    {
        let mut kept = Entries::new();
        for key in self.readable_keys().await? {
            let Some(value) = self.get(&key).await? else {
                continue;
            };
            if predicate(&key, &value) {
                kept.insert(key, value);
            }
        }
        Ok(kept)
    }

    /// Whether any stored value is identical to `value`.
    ///
    /// Scalars (null, booleans, numbers, strings) compare by value. Arrays and
    /// objects have no identity that survives being moved into a driver, so
    /// they never match; there is no deep comparison.
    pub async fn includes(&self, value: &Value) -> EngineResult<bool> {
        Ok(self
            .values()
            .await?
            .iter()
            .any(|stored| identical(stored, value)))
    }

    /// Sample random entries.
    ///
    /// With `count` of `None`, 0 or 1 a single uniformly chosen entry is
    /// returned. With a larger `count`, up to `count` distinct entries are
    /// chosen without replacement; a smaller store yields all its entries.
    pub async fn random(&self, count: Option<usize>) -> EngineResult<Sample> {
        let keys = self.readable_keys().await?;

        match count {
            Some(n) if n > 1 => {
                let picked = pick_distinct(&keys, n);
                let values = self.bulk_get(&picked).await?;
                let entries = picked
                    .into_iter()
                    .zip(values)
                    .filter_map(|(key, value)| value.map(|v| single_entry(key, v)))
                    .collect();
                Ok(Sample::Many(entries))
            }
            _ => {
                if keys.is_empty() {
                    return Ok(Sample::Single(None));
                }
                let index = rand::thread_rng().gen_range(0..keys.len());
                let key = keys[index].clone();
                let entry = self.get(&key).await?.map(|v| single_entry(key, v));
                Ok(Sample::Single(entry))
            }
        }
    }

    /// Visit every entry in `keys()` order.
    ///
    /// Each future returned by `visit` is awaited before the next key is
    /// read, so side effects happen strictly in key order.
    pub async fn for_each<F, Fut>(&self, mut visit: F) -> EngineResult<()>
    where
        F: FnMut(String, Value) -> Fut,
        Fut: Future<Output = ()>,
    {
        for key in self.readable_keys().await? {
            if let Some(value) = self.get(&key).await? {
                visit(key, value).await;
            }
        }
        Ok(())
    }

    /// Serialize the whole store.
    ///
    /// Defers to the driver's native snapshot when available. Otherwise the
    /// snapshot is a JSON object built from `keys()` and [`Engine::get`].
    pub async fn export_snapshot(&self) -> EngineResult<Snapshot> {
        if let Some(native) = self.driver.snapshots() {
            let result = async {
                self.admit(Operation::ExportSnapshot)?;
                native
                    .export_snapshot()
                    .await
                    .map_err(|e| EngineError::driver(Operation::ExportSnapshot, e))
            }
            .await;
            return self.observed(result);
        }

        debug!(driver = self.driver.name(), "no snapshot capability; exporting via get");
        let mut entries = Entries::new();
        for key in self.readable_keys().await? {
            if let Some(value) = self.get(&key).await? {
                entries.insert(key, value);
            }
        }
        let text = self.observed(serde_json::to_string(&entries).map_err(EngineError::from))?;
        Ok(Snapshot::from(text))
    }

    /// Replace the store with the contents of `snapshot`.
    ///
    /// Defers to the driver's native import when available; such a driver
    /// is expected to refuse empty keys itself. Otherwise the snapshot must
    /// be a JSON object with non-empty keys; the store is cleared and the
    /// entries are written with [`Engine::bulk_set`].
    pub async fn import_snapshot(&self, snapshot: &Snapshot) -> EngineResult<()> {
        if let Some(native) = self.driver.snapshots() {
            let result = async {
                self.admit(Operation::ImportSnapshot)?;
                native
                    .import_snapshot(snapshot)
                    .await
                    .map_err(|e| EngineError::driver(Operation::ImportSnapshot, e))
            }
            .await;
            return self.observed(result);
        }

        let entries = self.observed(parse_snapshot(snapshot))?;
        self.observed(admit_keys(Operation::ImportSnapshot, entries.keys()))?;
        debug!(entries = entries.len(), "importing snapshot via clear + bulk_set");
        self.clear().await?;
        self.bulk_set(entries).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// `keys()` minus keys [`Engine::get`] would refuse.
    ///
    /// A driver can hold an empty key when it was written behind the engine's
    /// back (a native snapshot import, or data already on disk). Scans skip
    /// it instead of failing on every call.
    async fn readable_keys(&self) -> EngineResult<Vec<String>> {
        let mut keys = self.keys().await?;
        let before = keys.len();
        keys.retain(|key| !key.is_empty());
        if keys.len() != before {
            warn!(driver = self.driver.name(), "skipping empty key held by driver");
        }
        Ok(keys)
    }

    fn admit(&self, op: Operation) -> EngineResult<()> {
        if self.settings.enforce_connection && !self.is_connected() {
            return Err(EngineError::NotConnected { op });
        }
        Ok(())
    }

    fn admit_key(&self, op: Operation, key: &str) -> EngineResult<()> {
        self.admit(op)?;
        if key.is_empty() {
            return Err(EngineError::InvalidKey(format!("{op}: key must not be empty")));
        }
        Ok(())
    }

    /// Route a failed result through the error handler, leaving it unchanged.
    fn observed<T>(&self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    fn fail<T>(&self, err: EngineError) -> EngineResult<T> {
        self.report(&err);
        Err(err)
    }

    fn report(&self, err: &EngineError) {
        warn!(driver = self.driver.name(), error = %err, "operation failed");
        self.chain.notify_error(err);
        self.events.emit(LifecycleEvent::Error(err.clone()));
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("driver", &self.driver.name())
            .field("middleware", &self.chain)
            .field("connected", &self.is_connected())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Reject the whole batch if any key is empty.
fn admit_keys<I>(op: Operation, keys: I) -> EngineResult<()>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if keys.into_iter().any(|key| key.as_ref().is_empty()) {
        return Err(EngineError::InvalidKey(format!("{op}: key must not be empty")));
    }
    Ok(())
}

fn single_entry(key: String, value: Value) -> Entries {
    let mut entry = Entries::new();
    entry.insert(key, value);
    entry
}

/// Choose up to `count` distinct keys by repeated uniform draws, rejecting
/// duplicates.
fn pick_distinct(keys: &[String], count: usize) -> Vec<String> {
    let target = count.min(keys.len());
    let mut rng = rand::thread_rng();
    let mut seen = HashSet::with_capacity(target);
    let mut picked = Vec::with_capacity(target);
    while picked.len() < target {
        let index = rng.gen_range(0..keys.len());
        if seen.insert(index) {
            picked.push(keys[index].clone());
        }
    }
    picked
}

fn parse_snapshot(snapshot: &Snapshot) -> EngineResult<Entries> {
    let parsed: Value = serde_json::from_slice(snapshot.as_bytes())?;
    match parsed {
        Value::Object(entries) => Ok(entries),
        other => Err(EngineError::ContractViolation(format!(
            "snapshot must be a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn identical(stored: &Value, probe: &Value) -> bool {
    match (stored, probe) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => same_number(a, b),
        _ => false,
    }
}

/// `1` and `1.0` are the same number.
fn same_number(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    a.as_f64() == b.as_f64()
}
