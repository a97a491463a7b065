//! WebSocket message envelopes.
//!
//! Both directions share the `{type, payload}` envelope shape. Inbound
//! messages are parsed in two steps (envelope first, then the typed payload
//! for known types) so an unknown `type` can be dropped without treating it
//! as malformed JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Raw inbound envelope. `payload` defaults to null for payload-less types.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerminalInputPayload {
    pub command: String,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TerminalResizePayload {
    pub cols: u16,
    pub rows: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipboardSyncPayload {
    pub content: String,
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished {
        session_id: Uuid,
        cloudpc_id: Uuid,
        connected_at: i64,
    },
    TerminalWelcome {
        motd: String,
    },
    TerminalOutput {
        session_id: Uuid,
        command: String,
        output: String,
        timestamp: i64,
    },
    TerminalError {
        message: String,
    },
    TerminalResized {
        cols: u16,
        rows: u16,
    },
    ClipboardSynced {
        bytes: usize,
    },
    MouseEventAck,
    KeyboardEventAck,
    Pong,
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Serialize to the wire envelope. Serialization of these variants
    /// cannot fail; the fallback exists so a broken derive never panics a
    /// connection task.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","payload":{"message":"encode failed"}}"#.into())
    }
}
