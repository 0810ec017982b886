//! Real-time channel over WebSocket.
//!
//! One socket is one session. Outbound events from the session router are
//! forwarded by a dedicated task; inbound text frames are parsed into
//! commands and applied in order.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use super::state::AppState;
use crate::domain::session::ClientCommand;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut events) = state.router.connect();

    let forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode outbound event");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        // Session closed by the server (shutdown): end the socket too.
        let _ = sender.send(Message::Close(None)).await;
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match ClientCommand::parse(&text) {
                Some(command) => state.router.handle(id, command).await,
                None => debug!(connection = %id, frame = %text, "Ignoring unrecognised frame"),
            },
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    state.router.disconnect(id);
    forward_task.abort();
}
