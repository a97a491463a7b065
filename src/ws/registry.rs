//! Connection registry.
//!
//! In-memory index of live WebSocket connections: a connection-by-id map
//! plus a cloud-PC fan-out index (one cloud-PC id may have several
//! observers). Routes inbound envelopes to their handlers and runs the
//! liveness sweep. Maps are mutated synchronously between await points;
//! no lock is ever held across one.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use axum::extract::ws::Message;
use metrics::{counter, gauge};
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::lock::{rw_read, rw_write};

use super::messages::{
    ClipboardSyncPayload, Envelope, ServerMessage, TerminalInputPayload, TerminalResizePayload,
};
use super::session::{RecordOutcome, SessionStore};
use super::shell;

const SOURCE: &str = "ws::registry";

pub const METRIC_WS_CONNECTIONS: &str = "nimbus_ws_connections";
pub const METRIC_WS_MESSAGES_TOTAL: &str = "nimbus_ws_messages_total";
pub const METRIC_WS_TERMINATED_TOTAL: &str = "nimbus_ws_terminated_total";

/// One live socket: ownership, attachment, and liveness state.
pub struct ConnectionRecord {
    pub user_id: Uuid,
    pub cloudpc_id: Uuid,
    pub session_id: Uuid,
    pub connected_at: OffsetDateTime,
    pub alive: bool,
    sender: UnboundedSender<Message>,
}

/// Result of one liveness sweep tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepOutcome {
    pub pinged: usize,
    pub terminated: usize,
}

/// Tracks live connections and their attached resources.
///
/// Constructed once at startup and shared by `Arc`; tests construct their
/// own instances.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Uuid, ConnectionRecord>>,
    by_cloudpc: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
    sessions: SessionStore,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Index a newly established connection and create its terminal
    /// session. Returns the session id.
    pub fn register(
        &self,
        conn_id: Uuid,
        user_id: Uuid,
        cloudpc_id: Uuid,
        sender: UnboundedSender<Message>,
    ) -> Uuid {
        let session_id = self.sessions.create(user_id, cloudpc_id);
        let record = ConnectionRecord {
            user_id,
            cloudpc_id,
            session_id,
            connected_at: OffsetDateTime::now_utc(),
            alive: true,
            sender,
        };

        rw_write(&self.connections, SOURCE, "register").insert(conn_id, record);
        rw_write(&self.by_cloudpc, SOURCE, "register.fanout")
            .entry(cloudpc_id)
            .or_default()
            .insert(conn_id);

        gauge!(METRIC_WS_CONNECTIONS).increment(1.0);
        info!(%conn_id, %user_id, %cloudpc_id, %session_id, "connection registered");
        session_id
    }

    /// Remove a connection from both indexes and mark its terminal session
    /// inactive. Idempotent.
    pub fn deregister(&self, conn_id: Uuid) {
        let record = rw_write(&self.connections, SOURCE, "deregister").remove(&conn_id);
        let Some(record) = record else {
            return;
        };

        let mut fanout = rw_write(&self.by_cloudpc, SOURCE, "deregister.fanout");
        if let Some(observers) = fanout.get_mut(&record.cloudpc_id) {
            observers.remove(&conn_id);
            if observers.is_empty() {
                fanout.remove(&record.cloudpc_id);
            }
        }
        drop(fanout);

        self.sessions.deactivate(record.session_id);
        gauge!(METRIC_WS_CONNECTIONS).decrement(1.0);
        info!(%conn_id, cloudpc_id = %record.cloudpc_id, "connection deregistered");
    }

    /// Reset the liveness flag; called on every pong.
    pub fn mark_alive(&self, conn_id: Uuid) {
        if let Some(record) =
            rw_write(&self.connections, SOURCE, "mark_alive").get_mut(&conn_id)
        {
            record.alive = true;
        }
    }

    pub fn is_registered(&self, conn_id: Uuid) -> bool {
        rw_read(&self.connections, SOURCE, "is_registered").contains_key(&conn_id)
    }

    pub fn connection_count(&self) -> usize {
        rw_read(&self.connections, SOURCE, "connection_count").len()
    }

    pub fn observer_count(&self, cloudpc_id: Uuid) -> usize {
        rw_read(&self.by_cloudpc, SOURCE, "observer_count")
            .get(&cloudpc_id)
            .map_or(0, HashSet::len)
    }

    pub fn session_id_of(&self, conn_id: Uuid) -> Option<Uuid> {
        rw_read(&self.connections, SOURCE, "session_id_of")
            .get(&conn_id)
            .map(|record| record.session_id)
    }

    /// Send a server message to one connection.
    pub fn send_to(&self, conn_id: Uuid, message: &ServerMessage) -> bool {
        let sender = rw_read(&self.connections, SOURCE, "send_to")
            .get(&conn_id)
            .map(|record| record.sender.clone());
        match sender {
            Some(sender) => sender
                .send(Message::Text(message.to_json().into()))
                .is_ok(),
            None => false,
        }
    }

    /// Send a server message to every connection observing a cloud-PC.
    /// Returns the number of deliveries.
    pub fn broadcast_to_cloudpc(&self, cloudpc_id: Uuid, message: &ServerMessage) -> usize {
        let observers: Vec<Uuid> = rw_read(&self.by_cloudpc, SOURCE, "broadcast")
            .get(&cloudpc_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for conn_id in observers {
            if self.send_to(conn_id, message) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Parse and dispatch one inbound frame.
    ///
    /// Malformed JSON is answered with a single `error` envelope; unknown
    /// message types are logged and dropped. A handler failure is contained
    /// to this one message: the sender gets an `error` reply and every other
    /// connection is untouched.
    pub fn route_message(&self, conn_id: Uuid, raw: &str) {
        let envelope = match Envelope::parse(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(%conn_id, error = %err, "malformed message");
                self.send_to(
                    conn_id,
                    &ServerMessage::Error {
                        message: "invalid message format".to_string(),
                    },
                );
                return;
            }
        };

        counter!(METRIC_WS_MESSAGES_TOTAL, "kind" => envelope.kind.clone()).increment(1);

        match envelope.kind.as_str() {
            "terminal_input" => match serde_json::from_value::<TerminalInputPayload>(envelope.payload) {
                Ok(payload) => self.handle_terminal_input(conn_id, payload),
                Err(err) => self.reply_handler_error(conn_id, "terminal_input", &err.to_string()),
            },
            "terminal_resize" => match serde_json::from_value::<TerminalResizePayload>(envelope.payload) {
                Ok(payload) => {
                    self.send_to(
                        conn_id,
                        &ServerMessage::TerminalResized {
                            cols: payload.cols,
                            rows: payload.rows,
                        },
                    );
                }
                Err(err) => self.reply_handler_error(conn_id, "terminal_resize", &err.to_string()),
            },
            "clipboard_sync" => match serde_json::from_value::<ClipboardSyncPayload>(envelope.payload) {
                Ok(payload) => {
                    self.send_to(
                        conn_id,
                        &ServerMessage::ClipboardSynced {
                            bytes: payload.content.len(),
                        },
                    );
                }
                Err(err) => self.reply_handler_error(conn_id, "clipboard_sync", &err.to_string()),
            },
            "mouse_event" => {
                self.send_to(conn_id, &ServerMessage::MouseEventAck);
            }
            "keyboard_event" => {
                self.send_to(conn_id, &ServerMessage::KeyboardEventAck);
            }
            "ping" => {
                self.send_to(conn_id, &ServerMessage::Pong);
            }
            other => {
                debug!(%conn_id, kind = other, "unknown message type dropped");
            }
        }
    }

    fn reply_handler_error(&self, conn_id: Uuid, kind: &str, error: &str) {
        warn!(%conn_id, kind, error, "message handler failed");
        self.send_to(
            conn_id,
            &ServerMessage::Error {
                message: format!("failed to handle {kind}"),
            },
        );
    }

    fn handle_terminal_input(&self, conn_id: Uuid, payload: TerminalInputPayload) {
        let output = shell::execute(&payload.command);
        match self
            .sessions
            .record_command(payload.session_id, &payload.command, &output)
        {
            RecordOutcome::Recorded { session_id } => {
                self.send_to(
                    conn_id,
                    &ServerMessage::TerminalOutput {
                        session_id,
                        command: payload.command,
                        output,
                        timestamp: OffsetDateTime::now_utc().unix_timestamp(),
                    },
                );
            }
            RecordOutcome::UnknownSession | RecordOutcome::InactiveSession => {
                self.send_to(
                    conn_id,
                    &ServerMessage::TerminalError {
                        message: "terminal session not found".to_string(),
                    },
                );
            }
        }
    }

    /// One liveness tick.
    ///
    /// Connections whose flag is still down are forcibly terminated and
    /// deregistered; the rest get their flag cleared and a ping (the pong
    /// must reset it before the next tick).
    pub fn liveness_sweep(&self) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let mut dead: Vec<Uuid> = Vec::new();

        {
            let mut connections = rw_write(&self.connections, SOURCE, "liveness_sweep");
            for (conn_id, record) in connections.iter_mut() {
                if record.alive {
                    record.alive = false;
                    let _ = record.sender.send(Message::Ping(Vec::new().into()));
                    outcome.pinged += 1;
                } else {
                    dead.push(*conn_id);
                }
            }
        }

        for conn_id in dead {
            self.terminate(conn_id);
            outcome.terminated += 1;
        }

        if outcome.terminated > 0 {
            counter!(METRIC_WS_TERMINATED_TOTAL).increment(outcome.terminated as u64);
            info!(
                terminated = outcome.terminated,
                pinged = outcome.pinged,
                "liveness sweep removed unresponsive connections"
            );
        }
        outcome
    }

    /// Force-close a connection and drop it from both indexes.
    pub fn terminate(&self, conn_id: Uuid) {
        let sender = rw_read(&self.connections, SOURCE, "terminate")
            .get(&conn_id)
            .map(|record| record.sender.clone());
        if let Some(sender) = sender {
            let _ = sender.send(Message::Close(None));
        }
        self.deregister(conn_id);
    }

    /// Prune stale inactive terminal sessions.
    pub fn session_retention_sweep(&self, retention: Duration) -> usize {
        let pruned = self.sessions.prune_inactive(retention);
        if pruned > 0 {
            info!(pruned, "retention sweep removed inactive terminal sessions");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;

    fn connect(
        registry: &ConnectionRegistry,
        cloudpc_id: Uuid,
    ) -> (Uuid, Uuid, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();
        let session_id = registry.register(conn_id, Uuid::new_v4(), cloudpc_id, tx);
        (conn_id, session_id, rx)
    }

    fn next_text(rx: &mut UnboundedReceiver<Message>) -> serde_json::Value {
        match rx.try_recv().expect("expected a queued message") {
            Message::Text(text) => serde_json::from_str(text.as_str()).expect("valid json"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_observer_and_nobody_else() {
        let registry = ConnectionRegistry::new();
        let target = Uuid::new_v4();
        let other = Uuid::new_v4();

        let (_, _, mut rx_a) = connect(&registry, target);
        let (_, _, mut rx_b) = connect(&registry, target);
        let (_, _, mut rx_c) = connect(&registry, other);

        let delivered = registry.broadcast_to_cloudpc(
            target,
            &ServerMessage::TerminalWelcome {
                motd: "status update".to_string(),
            },
        );
        assert_eq!(delivered, 2);

        assert_eq!(next_text(&mut rx_a)["type"], "terminal_welcome");
        assert_eq!(next_text(&mut rx_b)["type"], "terminal_welcome");
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminal_input_round_trip() {
        let registry = ConnectionRegistry::new();
        let (conn_id, session_id, mut rx) = connect(&registry, Uuid::new_v4());

        let raw = format!(
            r#"{{"type":"terminal_input","payload":{{"command":"pwd","session_id":"{session_id}"}}}}"#
        );
        registry.route_message(conn_id, &raw);

        let reply = next_text(&mut rx);
        assert_eq!(reply["type"], "terminal_output");
        assert_eq!(reply["payload"]["output"], "/home/user");

        let session = registry.sessions().get(session_id).unwrap();
        assert_eq!(session.history_len(), 1);
    }

    #[tokio::test]
    async fn terminal_input_for_unknown_session_is_an_error_without_state_change() {
        let registry = ConnectionRegistry::new();
        let (conn_id, session_id, mut rx) = connect(&registry, Uuid::new_v4());

        let raw = format!(
            r#"{{"type":"terminal_input","payload":{{"command":"pwd","session_id":"{}"}}}}"#,
            Uuid::new_v4()
        );
        registry.route_message(conn_id, &raw);

        assert_eq!(next_text(&mut rx)["type"], "terminal_error");
        assert_eq!(registry.sessions().get(session_id).unwrap().history_len(), 0);
    }

    #[tokio::test]
    async fn malformed_json_gets_one_error_reply_and_connection_survives() {
        let registry = ConnectionRegistry::new();
        let (conn_id, _, mut rx) = connect(&registry, Uuid::new_v4());

        registry.route_message(conn_id, "{{{ not json");

        let reply = next_text(&mut rx);
        assert_eq!(reply["type"], "error");
        assert!(rx.try_recv().is_err(), "exactly one reply expected");
        assert!(registry.is_registered(conn_id));
    }

    #[tokio::test]
    async fn unknown_message_type_is_dropped_silently() {
        let registry = ConnectionRegistry::new();
        let (conn_id, _, mut rx) = connect(&registry, Uuid::new_v4());

        registry.route_message(conn_id, r#"{"type":"file_transfer","payload":{}}"#);

        assert!(rx.try_recv().is_err());
        assert!(registry.is_registered(conn_id));
    }

    #[tokio::test]
    async fn bad_payload_is_contained_to_the_sender() {
        let registry = ConnectionRegistry::new();
        let cloudpc_id = Uuid::new_v4();
        let (conn_a, _, mut rx_a) = connect(&registry, cloudpc_id);
        let (_, _, mut rx_b) = connect(&registry, cloudpc_id);

        registry.route_message(conn_a, r#"{"type":"terminal_resize","payload":{"cols":"wide"}}"#);

        assert_eq!(next_text(&mut rx_a)["type"], "error");
        assert!(rx_b.try_recv().is_err());
        assert_eq!(registry.connection_count(), 2);
    }

    #[tokio::test]
    async fn control_messages_are_acked() {
        let registry = ConnectionRegistry::new();
        let (conn_id, _, mut rx) = connect(&registry, Uuid::new_v4());

        registry.route_message(
            conn_id,
            r#"{"type":"terminal_resize","payload":{"cols":120,"rows":40}}"#,
        );
        let reply = next_text(&mut rx);
        assert_eq!(reply["type"], "terminal_resized");
        assert_eq!(reply["payload"]["cols"], 120);

        registry.route_message(
            conn_id,
            r#"{"type":"clipboard_sync","payload":{"content":"copy me"}}"#,
        );
        assert_eq!(next_text(&mut rx)["type"], "clipboard_synced");

        registry.route_message(conn_id, r#"{"type":"mouse_event","payload":{"x":1,"y":2}}"#);
        assert_eq!(next_text(&mut rx)["type"], "mouse_event_ack");

        registry.route_message(conn_id, r#"{"type":"ping"}"#);
        assert_eq!(next_text(&mut rx)["type"], "pong");
    }

    #[tokio::test]
    async fn liveness_sweep_terminates_after_one_missed_pong() {
        let registry = ConnectionRegistry::new();
        let cloudpc_id = Uuid::new_v4();
        let (conn_id, _, mut rx) = connect(&registry, cloudpc_id);

        // First tick: flag cleared, ping sent, still registered.
        let outcome = registry.liveness_sweep();
        assert_eq!(outcome, SweepOutcome { pinged: 1, terminated: 0 });
        assert!(matches!(rx.try_recv().unwrap(), Message::Ping(_)));
        assert!(registry.is_registered(conn_id));

        // No pong arrives. Second tick: terminated and removed everywhere.
        let outcome = registry.liveness_sweep();
        assert_eq!(outcome, SweepOutcome { pinged: 0, terminated: 1 });
        assert!(!registry.is_registered(conn_id));
        assert_eq!(registry.observer_count(cloudpc_id), 0);
        assert!(matches!(rx.try_recv().unwrap(), Message::Close(_)));
    }

    #[tokio::test]
    async fn pong_resets_the_liveness_flag() {
        let registry = ConnectionRegistry::new();
        let (conn_id, _, _rx) = connect(&registry, Uuid::new_v4());

        registry.liveness_sweep();
        registry.mark_alive(conn_id);
        let outcome = registry.liveness_sweep();

        assert_eq!(outcome.terminated, 0);
        assert!(registry.is_registered(conn_id));
    }

    #[tokio::test]
    async fn deregister_marks_session_inactive_but_keeps_it() {
        let registry = ConnectionRegistry::new();
        let cloudpc_id = Uuid::new_v4();
        let (conn_id, session_id, _rx) = connect(&registry, cloudpc_id);

        registry.deregister(conn_id);

        assert!(!registry.is_registered(conn_id));
        assert_eq!(registry.observer_count(cloudpc_id), 0);
        let session = registry.sessions().get(session_id).unwrap();
        assert!(!session.active);
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn_id, _, _rx) = connect(&registry, Uuid::new_v4());
        registry.deregister(conn_id);
        registry.deregister(conn_id);
        assert_eq!(registry.connection_count(), 0);
    }
}
