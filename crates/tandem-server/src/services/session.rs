use crate::session::{ConnectionId, InboundEvent, Matchmaker, MatchmakerOptions, Outbound};
use crate::ws::connections::ConnectionManager;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tandem_protocol::{ClientMessage, ServerMessage, SessionStats};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Serializes every mutation of the matchmaking state.
///
/// Outbound messages are handed to the socket channels while the lock is
/// still held, so per-room delivery order equals processing order and nothing
/// is ever delivered to a connection after its teardown ran.
#[derive(Clone)]
pub struct SessionService {
    core: Arc<Mutex<Matchmaker>>,
    connections: Arc<ConnectionManager>,
}

impl SessionService {
    pub fn new(options: MatchmakerOptions, connections: Arc<ConnectionManager>) -> Self {
        Self {
            core: Arc::new(Mutex::new(Matchmaker::new(options))),
            connections,
        }
    }

    /// Register a new socket and greet it with its connection id
    pub async fn connect(&self, sender: mpsc::UnboundedSender<String>) -> ConnectionId {
        let mut core = self.core.lock().await;
        let connection_id = core.connect(Utc::now());
        self.connections.add_connection(connection_id, sender).await;
        self.connections
            .send_to_connection(connection_id, &ServerMessage::Connected { connection_id })
            .await;
        connection_id
    }

    pub async fn handle_message(&self, from: ConnectionId, message: ClientMessage) {
        let mut core = self.core.lock().await;
        let outbound = core.dispatch(from, message.into(), Utc::now());
        self.deliver(outbound).await;
    }

    /// Tear down everything the connection was part of. Safe to call twice.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut core = self.core.lock().await;
        let outbound = core.dispatch(connection_id, InboundEvent::Disconnect, Utc::now());
        self.connections.remove_connection(connection_id).await;
        self.deliver(outbound).await;
    }

    pub async fn sweep(&self) {
        let mut core = self.core.lock().await;
        let outbound = core.sweep(Utc::now());
        self.deliver(outbound).await;
    }

    pub async fn stats(&self) -> SessionStats {
        self.core.lock().await.stats()
    }

    /// Run queue maintenance every `period` until the runtime shuts down
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                service.sweep().await;
            }
        })
    }

    async fn deliver(&self, outbound: Vec<Outbound>) {
        for Outbound { to, message } in outbound {
            self.connections.send_to_connection(to, &message).await;
        }
    }
}
