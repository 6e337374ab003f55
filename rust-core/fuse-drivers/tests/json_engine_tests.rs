// SPDX-License-Identifier: PMPL-1.0-or-later
//! Engine-level tests over the JSON-file driver.

use fuse_core::{Engine, EngineConfig, LifecycleEvent};
use fuse_drivers::{JsonFileDriver, JsonFileOptions};
use serde_json::{json, Value};
use tempfile::tempdir;

#[tokio::test]
async fn test_engine_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fuse.json");

    {
        let engine = Engine::builder()
            .with_driver(JsonFileDriver::open(&path).await.unwrap())
            .build()
            .unwrap();
        let info = engine.connect().await.unwrap();
        assert_eq!(info.driver, "json-file");

        engine.set("foo", json!(1)).await.unwrap();
        engine.set("fizz", json!(2)).await.unwrap();
        engine.set("bar", json!(3)).await.unwrap();
        engine.disconnect().await.unwrap();
    }

    let engine = Engine::builder()
        .with_driver(JsonFileDriver::open(&path).await.unwrap())
        .build()
        .unwrap();
    let found = engine.find("f*").await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["foo"], json!(1));
    assert_eq!(found["fizz"], json!(2));
}

#[tokio::test]
async fn test_bulk_set_goes_through_driver_batch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fuse.json");
    let engine = EngineConfig::default()
        .with_driver(JsonFileDriver::open(&path).await.unwrap())
        .build()
        .unwrap();

    let mut entries = fuse_core::Entries::new();
    entries.insert("a".into(), json!(1));
    entries.insert("b".into(), json!(2));
    engine.bulk_set(entries).await.unwrap();

    let keys = engine.keys().await.unwrap();
    assert!(keys.contains(&"a".to_string()));
    assert!(keys.contains(&"b".to_string()));

    let on_disk: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk, json!({"a": 1, "b": 2}));

    engine.bulk_remove(&["a"]).await.unwrap();
    assert_eq!(engine.keys().await.unwrap(), vec!["b"]);
}

#[tokio::test]
async fn test_snapshot_fallback_round_trip() {
    let dir = tempdir().unwrap();
    let engine = Engine::builder()
        .with_driver(
            JsonFileDriver::with_options(JsonFileOptions::new(dir.path().join("s.json")).autosave(false))
                .await
                .unwrap(),
        )
        .build()
        .unwrap();

    engine.set("x", json!({"deep": [1, 2]})).await.unwrap();
    engine.set("y", json!("why")).await.unwrap();

    let snapshot = engine.export_snapshot().await.unwrap();
    engine.clear().await.unwrap();
    assert_eq!(engine.size().await.unwrap(), 0);

    engine.import_snapshot(&snapshot).await.unwrap();
    assert_eq!(engine.keys().await.unwrap(), vec!["x", "y"]);
    assert_eq!(engine.get("x").await.unwrap(), Some(json!({"deep": [1, 2]})));
}

#[tokio::test]
async fn test_connect_event_carries_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("evt.json");
    let engine = Engine::builder()
        .with_driver(JsonFileDriver::open(&path).await.unwrap())
        .build()
        .unwrap();
    let mut events = engine.subscribe();

    engine.connect().await.unwrap();
    match events.recv().await {
        Some(LifecycleEvent::Connected(info)) => {
            assert_eq!(info.details["path"], json!(path.display().to_string()));
        }
        other => panic!("expected Connected, got {other:?}"),
    }
}
