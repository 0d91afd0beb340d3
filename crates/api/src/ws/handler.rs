use axum::{
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::Response,
};
use futures::StreamExt;
use futures::SinkExt;
use huddle_signaling::ClientEvent;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!(%connection_id, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    state.ws_storage.add(connection_id.clone(), sender.clone());

    // Message loop
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_frame(&state, &connection_id, &text).await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(%connection_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Cleanup: leave the meeting (notifying peers) and drop the sender.
    // Runs on every exit path, including abrupt transport loss.
    state.relay.disconnect(&connection_id).await;
    state.ws_storage.remove(&connection_id);

    info!(%connection_id, "WebSocket disconnected");
}

async fn handle_client_frame(state: &AppState, connection_id: &str, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(%connection_id, %e, "unparseable signaling frame dropped");
            return;
        }
    };

    debug!(%connection_id, ?event, "WS event received");
    state.relay.handle(connection_id, event).await;
}
