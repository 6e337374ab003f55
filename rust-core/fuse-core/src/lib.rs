// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FuseDB Core
//
// A storage-agnostic asynchronous key-value engine. One `Driver` supplies the
// storage primitives; an ordered list of `Middleware` intercepts reads and
// writes; an `EventBus` publishes lifecycle notifications. The `Engine` ties
// them together and derives bulk, search, sampling and snapshot operations
// from the primitives.
//
// # Modules
//
// - [`driver`] -- The `Driver` trait and its optional capabilities.
// - [`middleware`] -- The `Middleware` trait with before/after hooks.
// - [`pipeline`] -- The ordered hook fold used by the engine.
// - [`events`] -- Lifecycle events and the broadcast bus.
// - [`engine`] -- The `Engine` and its public operations.
// - [`memory`] -- The default in-memory driver.
// - [`pattern`] -- Glob patterns for `Engine::find`.
// - [`typed`] -- A serde-based, namespaced view over an engine.
// - [`config`] -- Engine construction and tunables.
// - [`error`] -- Error types for drivers, hooks and the engine.
//
// # Example
//
// ```rust
// use fuse_core::{Engine, EngineConfig, InMemoryDriver};
// use serde_json::json;
//
// # tokio_test::block_on(async {
// let engine = EngineConfig::default()
//     .with_driver(InMemoryDriver::new())
//     .build()
//     .unwrap();
// engine.connect().await.unwrap();
//
// engine.set("foo", json!(1)).await.unwrap();
// engine.set("fizz", json!(2)).await.unwrap();
// engine.set("bar", json!(3)).await.unwrap();
//
// let found = engine.find("f*").await.unwrap();
// assert_eq!(found.len(), 2);
// # });
// ```

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod events;
pub mod memory;
pub mod middleware;
pub mod pattern;
pub mod pipeline;
pub mod typed;

// Re-export the most commonly used types at the crate root for convenience.
pub use config::{EngineConfig, EngineSettings};
pub use driver::{BulkDriver, ConnectionInfo, Driver, Entries, Snapshot, SnapshotDriver};
pub use engine::{Engine, Sample};
pub use error::{DriverError, EngineError, EngineResult, HookError, HookPhase, Operation};
pub use events::{EventBus, EventKind, LifecycleEvent, Subscription, DEFAULT_EVENT_CAPACITY};
pub use memory::InMemoryDriver;
pub use middleware::{Middleware, Replace};
pub use pattern::GlobPattern;
pub use pipeline::MiddlewareChain;
pub use typed::TypedStore;

// Hooks and drivers speak `serde_json::Value`; re-export it so collaborators
// need not pin their own copy.
pub use serde_json::{json, Value};
