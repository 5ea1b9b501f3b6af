//! `GET /ws` — the real-time order feed.
//!
//! Upgrades the HTTP connection to a WebSocket, registers it with the
//! [`ConnectionRegistry`] (which sends the initial snapshot), then
//! drives the receive loop until the client goes away.

use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header::USER_AGENT},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use orderstream_core::connections::{ConnectionSink, SinkError};
use orderstream_sdk::objects::ws::{WsClientMessage, WsServerMessage};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Upgrade the HTTP connection and hand the socket to the registry.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let client_info = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("Unknown")
        .to_owned();
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_info))
}

/// Outbound half of one client socket, shared between the registry's
/// broadcast tasks and this connection's pong replies.
struct WebSocketSink {
    tx: Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl ConnectionSink for WebSocketSink {
    async fn send_text(&self, text: &str) -> Result<(), SinkError> {
        self.tx
            .lock()
            .await
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| SinkError::new(e.to_string()))
    }
}

/// Drive one connection: register, relay pings, deregister on close.
async fn handle_socket(socket: WebSocket, state: AppState, client_info: String) {
    let (tx, mut rx) = socket.split();
    let sink = Arc::new(WebSocketSink { tx: Mutex::new(tx) });
    let id = state.registry.connect(sink.clone(), client_info).await;

    while let Some(frame) = rx.next().await {
        match frame {
            // Only a structured ping is meaningful; any other text frame
            // is dropped without a reply.
            Ok(Message::Text(text)) => {
                if let Ok(WsClientMessage::Ping) =
                    serde_json::from_str::<WsClientMessage>(text.as_str())
                {
                    send_pong(&sink).await;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection = %id, error = %e, "websocket receive error");
                break;
            }
        }
    }

    state.registry.disconnect(id).await;
}

/// Answer a client ping with a heartbeat frame on that connection only.
async fn send_pong(sink: &Arc<WebSocketSink>) {
    let pong = WsServerMessage::heartbeat();
    match serde_json::to_string(&pong) {
        Ok(text) => {
            if let Err(e) = sink.send_text(&text).await {
                tracing::debug!(error = %e, "pong send failed");
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize pong"),
    }
}
