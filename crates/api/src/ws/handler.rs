use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::state::AppState;

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let transport = NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed);
    info!(transport, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));
    state.ws_storage.add(transport, sender.clone());

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, transport, &sender, &text).await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(transport, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    state.ws_storage.remove(transport);
    info!(transport, "WebSocket disconnected");
}

async fn handle_client_message(
    state: &AppState,
    transport: u64,
    sender: &crate::ws::storage::WsSender,
    text: &str,
) {
    let request: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(transport, %e, "malformed JSON on WebSocket");
            let err = serde_json::json!({
                "janus": "error",
                "error": {"code": 454, "reason": format!("JSON parse error: {e}")},
            });
            send(sender, &err).await;
            return;
        }
    };

    debug!(transport, "dispatching WebSocket request");
    let dispatched = state.dispatcher.dispatch(&request, transport).await;

    if let Some(ack) = dispatched.ack {
        send(sender, &ack).await;
    }
    send(sender, &dispatched.reply).await;
}

async fn send(sender: &crate::ws::storage::WsSender, message: &serde_json::Value) {
    let text = serde_json::to_string(message).unwrap_or_default();
    let mut guard = sender.lock().await;
    let _ = guard.send(Message::text(text)).await;
}
