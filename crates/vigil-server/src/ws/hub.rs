use axum::body::Bytes;
use axum::extract::ws::Message;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to one dashboard connection.
pub type HubSender = mpsc::UnboundedSender<Message>;

/// Fan-out of JSON messages to all live dashboard connections.
///
/// The only state is the live connection map, guarded by one lock:
/// connect, disconnect, and the eviction of failed connections all go
/// through it. `broadcast` snapshots the membership first and sends
/// lock-free, so connections added or removed mid-broadcast never race
/// the underlying map. Per-connection ordering is preserved by each
/// connection's own queue; socket I/O happens in per-connection tasks,
/// so a slow client cannot stall the fan-out.
pub struct BroadcastHub {
    connections: RwLock<HashMap<String, HubSender>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a connection and returns the receiver half the socket
    /// forwarding task drains. Re-registering an ID replaces the old
    /// sender, whose receiver then closes.
    pub async fn connect(&self, conn_id: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.write().await.insert(conn_id.to_string(), tx);
        rx
    }

    /// Removes a connection. Safe to call for IDs already removed.
    pub async fn disconnect(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Sends `message` (plus a server-stamped `timestamp` field) to every
    /// live connection and returns the number of successful deliveries.
    ///
    /// A failed send means the connection's forwarding task is gone; such
    /// connections are evicted from the live set as a side effect, so
    /// membership is self-healing.
    pub async fn broadcast(&self, mut message: serde_json::Value) -> usize {
        if let Some(obj) = message.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(Utc::now().to_rfc3339()),
            );
        }
        let text = Message::Text(message.to_string().into());

        let snapshot: Vec<(String, HubSender)> = {
            let conns = self.connections.read().await;
            conns.iter().map(|(id, tx)| (id.clone(), tx.clone())).collect()
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (conn_id, tx) in snapshot {
            if tx.send(text.clone()).is_ok() {
                delivered += 1;
            } else {
                failed.push(conn_id);
            }
        }

        if !failed.is_empty() {
            let mut conns = self.connections.write().await;
            for conn_id in &failed {
                conns.remove(conn_id);
                tracing::info!(conn_id = %conn_id, "Evicted dead dashboard connection");
            }
        }

        delivered
    }

    /// Current number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Sends a Ping frame to every connection (heartbeat task).
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for tx in conns.values() {
            let _ = tx.send(Message::Ping(Bytes::new()));
        }
    }

    /// Sends a Close frame to every connection and clears the map.
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for tx in conns.values() {
            let _ = tx.send(Message::Close(None));
        }
        conns.clear();
        if count > 0 {
            tracing::info!(count, "Closed all dashboard connections");
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
