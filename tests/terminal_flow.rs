//! End-to-end exercise of the WebSocket layer state machine without real
//! sockets: registry, sessions, shell simulator, and metric emission.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::Message;
use metrics_util::debugging::DebuggingRecorder;
use nimbus::cache::{CacheCategory, CacheService, KvStore, MemoryStore};
use nimbus::ws::registry::ConnectionRegistry;
use serial_test::serial;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

fn connect(
    registry: &ConnectionRegistry,
    cloudpc_id: Uuid,
) -> (Uuid, Uuid, UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn_id = Uuid::new_v4();
    let session_id = registry.register(conn_id, Uuid::new_v4(), cloudpc_id, tx);
    (conn_id, session_id, rx)
}

fn drain_types(rx: &mut UnboundedReceiver<Message>) -> Vec<String> {
    let mut kinds = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let Message::Text(text) = message {
            let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            kinds.push(value["type"].as_str().unwrap_or_default().to_string());
        }
    }
    kinds
}

#[tokio::test]
async fn full_terminal_session_lifecycle() {
    let registry = Arc::new(ConnectionRegistry::new());
    let cloudpc_id = Uuid::new_v4();
    let (conn_id, session_id, mut rx) = connect(&registry, cloudpc_id);

    // A realistic command exchange.
    for command in ["help", "ls", "cat readme.txt", "echo done", "nonexistent"] {
        let raw = format!(
            r#"{{"type":"terminal_input","payload":{{"command":"{command}","session_id":"{session_id}"}}}}"#
        );
        registry.route_message(conn_id, &raw);
    }

    let kinds = drain_types(&mut rx);
    assert_eq!(kinds, vec!["terminal_output"; 5]);

    let session = registry.sessions().get(session_id).unwrap();
    assert_eq!(session.history_len(), 5);
    let commands: Vec<_> = session.history().map(|e| e.command.clone()).collect();
    assert_eq!(commands[0], "help");
    assert_eq!(commands[4], "nonexistent");

    // Disconnect: the session survives inactive, then the retention sweep
    // with a zero-width window prunes it.
    registry.deregister(conn_id);
    assert!(!registry.is_registered(conn_id));
    assert!(!registry.sessions().get(session_id).unwrap().active);

    // Nothing is pruned while the window is generous.
    assert_eq!(
        registry.session_retention_sweep(std::time::Duration::from_secs(3600)),
        0
    );
    assert!(registry.sessions().get(session_id).is_some());
}

#[tokio::test]
async fn history_cap_survives_sustained_input() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (conn_id, session_id, mut rx) = connect(&registry, Uuid::new_v4());

    for i in 0..105 {
        let raw = format!(
            r#"{{"type":"terminal_input","payload":{{"command":"echo {i}","session_id":"{session_id}"}}}}"#
        );
        registry.route_message(conn_id, &raw);
    }

    assert_eq!(drain_types(&mut rx).len(), 105);

    let session = registry.sessions().get(session_id).unwrap();
    assert_eq!(session.history_len(), 100);
    assert_eq!(session.history().next().unwrap().command, "echo 5");
}

#[tokio::test]
async fn observers_of_different_cloudpcs_are_isolated() {
    let registry = Arc::new(ConnectionRegistry::new());
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    let (conn_a, session_a, mut rx_a) = connect(&registry, first);
    let (_conn_b, _session_b, mut rx_b) = connect(&registry, second);

    let raw = format!(
        r#"{{"type":"terminal_input","payload":{{"command":"pwd","session_id":"{session_a}"}}}}"#
    );
    registry.route_message(conn_a, &raw);

    assert_eq!(drain_types(&mut rx_a), vec!["terminal_output"]);
    assert!(drain_types(&mut rx_b).is_empty());

    assert_eq!(registry.observer_count(first), 1);
    assert_eq!(registry.observer_count(second), 1);
}

#[tokio::test]
#[serial]
async fn cache_and_ws_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Cache paths: set, hit, miss, delete.
    let cache = CacheService::new(KvStore::Memory(MemoryStore::new()));
    cache.set(CacheCategory::User, "u1", &"profile", None).await;
    let _: Option<String> = cache.get(CacheCategory::User, "u1").await;
    let _: Option<String> = cache.get(CacheCategory::User, "missing").await;
    cache.delete(CacheCategory::User, "u1").await;
    cache
        .invalidate(&nimbus::cache::InvalidationEvent::ConfigUpdated)
        .await;

    // WebSocket paths: register, message, sweep-terminate.
    let registry = ConnectionRegistry::new();
    let (tx, _rx) = mpsc::unbounded_channel();
    let conn_id = Uuid::new_v4();
    registry.register(conn_id, Uuid::new_v4(), Uuid::new_v4(), tx);
    registry.route_message(conn_id, r#"{"type":"ping"}"#);
    registry.liveness_sweep();
    registry.liveness_sweep();

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(key, _, _, _)| key.key().name().to_string())
        .collect();

    for expected in [
        "nimbus_cache_set_total",
        "nimbus_cache_hit_total",
        "nimbus_cache_miss_total",
        "nimbus_cache_delete_total",
        "nimbus_cache_invalidation_total",
        "nimbus_ws_connections",
        "nimbus_ws_messages_total",
        "nimbus_ws_terminated_total",
    ] {
        assert!(names.contains(expected), "missing metric key {expected}");
    }
}
