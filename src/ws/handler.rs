//! WebSocket endpoint: handshake verification and the per-connection loop.
//!
//! The upgrade URL must carry a bearer token and a target cloud-PC id. A
//! token that fails verification still completes the HTTP upgrade (there is
//! no other way to deliver a close code) and is then closed immediately with
//! a policy-violation close frame, never reaching the registry.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::infra::http::state::AppState;

use super::messages::ServerMessage;

const WELCOME_MOTD: &str =
    "Connected to your cloud workspace terminal. Type `help` for available commands.";

#[derive(Debug, Deserialize)]
pub struct TerminalQuery {
    pub token: String,
    pub cloudpc_id: Uuid,
}

pub async fn terminal_ws(
    State(state): State<AppState>,
    Query(query): Query<TerminalQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match state.verifier.verify(&query.token) {
        Ok(claims) => {
            let registry = state.registry.clone();
            ws.on_upgrade(move |socket| {
                run_connection(registry, socket, claims.user_id, query.cloudpc_id)
            })
        }
        Err(err) => {
            warn!(error = %err, "websocket handshake rejected");
            ws.on_upgrade(reject)
        }
    }
}

/// Close a connection that failed token verification.
async fn reject(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: "authentication failed".into(),
        })))
        .await;
}

async fn run_connection(
    registry: std::sync::Arc<crate::ws::ConnectionRegistry>,
    socket: WebSocket,
    user_id: Uuid,
    cloudpc_id: Uuid,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let conn_id = Uuid::new_v4();
    let session_id = registry.register(conn_id, user_id, cloudpc_id, tx);

    // Writer task: drains the outbound queue so the registry can send from
    // synchronous contexts (broadcasts, sweeps) without awaiting the sink.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    registry.send_to(
        conn_id,
        &ServerMessage::ConnectionEstablished {
            session_id,
            cloudpc_id,
            connected_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        },
    );
    registry.send_to(
        conn_id,
        &ServerMessage::TerminalWelcome {
            motd: WELCOME_MOTD.to_string(),
        },
    );

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => registry.route_message(conn_id, text.as_str()),
            Ok(Message::Pong(_)) => registry.mark_alive(conn_id),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(%conn_id, error = %err, "socket error, closing connection");
                break;
            }
        }
    }

    registry.deregister(conn_id);
    writer.abort();
}
