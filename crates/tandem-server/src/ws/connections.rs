use crate::session::ConnectionId;
use std::collections::HashMap;
use tandem_protocol::ServerMessage;
use tokio::sync::{mpsc, RwLock};

/// Outbound half of every live WebSocket
pub struct ConnectionManager {
    /// Map from connection ID to message sender channel
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_connection(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<String>,
    ) {
        self.senders.write().await.insert(connection_id, sender);
        tracing::debug!("Connection {} attached", connection_id);
    }

    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        if self.senders.write().await.remove(&connection_id).is_some() {
            tracing::debug!("Connection {} detached", connection_id);
        }
    }

    /// Returns false when the connection is gone or its socket task has ended
    pub async fn send_to_connection(
        &self,
        connection_id: ConnectionId,
        message: &ServerMessage,
    ) -> bool {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
                return false;
            }
        };

        let senders = self.senders.read().await;

        match senders.get(&connection_id) {
            Some(sender) => match sender.send(json) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!("Failed to send message to {}: {}", connection_id, e);
                    false
                }
            },
            None => {
                tracing::debug!("Dropping message for departed connection {}", connection_id);
                false
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
