use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::stream::SplitSink;
use janusd_core::session::TransportId;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Tracks the outbound sink for every live WebSocket connection, keyed by
/// the transport id handed to the dispatcher. A connection's sink is
/// wrapped in a mutex so the early ack and the final reply for the same
/// request are written without interleaving bytes from another task.
pub struct WsStorage {
    connections: DashMap<TransportId, WsSender>,
}

impl WsStorage {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn add(&self, transport: TransportId, sender: WsSender) {
        self.connections.insert(transport, sender);
    }

    pub fn remove(&self, transport: TransportId) {
        self.connections.remove(&transport);
    }

    pub fn get(&self, transport: TransportId) -> Option<WsSender> {
        self.connections.get(&transport).map(|s| s.clone())
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
