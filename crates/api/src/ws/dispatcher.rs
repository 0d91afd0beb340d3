use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use futures::SinkExt;
use huddle_signaling::{ServerEvent, SignalSink};
use tracing::{debug, warn};

use super::storage::WsStorage;

/// Sends a JSON message to a single connection. Unknown connections are
/// dropped silently; signaling is best-effort.
pub async fn send_to_connection(
    ws_storage: &WsStorage,
    connection_id: &str,
    message: &serde_json::Value,
) {
    let Some(sender) = ws_storage.get(connection_id) else {
        debug!(%connection_id, "no sender for connection, message dropped");
        return;
    };

    let text = serde_json::to_string(message).unwrap_or_default();
    let mut guard = sender.lock().await;
    if let Err(e) = guard.send(Message::text(text)).await {
        warn!(%connection_id, %e, "Failed to send WS message");
    }
}

/// `SignalSink` over the WebSocket storage: the seam the relay pushes
/// its outbound events through.
pub struct WsSignalSink {
    storage: Arc<WsStorage>,
}

impl WsSignalSink {
    pub fn new(storage: Arc<WsStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl SignalSink for WsSignalSink {
    async fn send(&self, connection_id: &str, event: &ServerEvent) {
        match serde_json::to_value(event) {
            Ok(value) => send_to_connection(&self.storage, connection_id, &value).await,
            Err(e) => warn!(%connection_id, %e, "Failed to serialize server event"),
        }
    }
}
