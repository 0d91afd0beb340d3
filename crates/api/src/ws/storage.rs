use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::stream::SplitSink;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Tracks the write half of every active WebSocket connection, keyed by
/// connection id. One entry per connection; sends to the same connection
/// serialize on its sink mutex.
pub struct WsStorage {
    connections: DashMap<String, WsSender>,
}

impl WsStorage {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn add(&self, connection_id: String, sender: WsSender) {
        self.connections.insert(connection_id, sender);
    }

    pub fn remove(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    pub fn get(&self, connection_id: &str) -> Option<WsSender> {
        self.connections.get(connection_id).map(|s| s.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for WsStorage {
    fn default() -> Self {
        Self::new()
    }
}
