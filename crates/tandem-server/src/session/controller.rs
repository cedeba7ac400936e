use super::queue::{MatchPolicy, MatchmakingQueue, Pairing};
use super::registry::{ConnectionRegistry, ConnectionState, Preferences};
use super::relay::{self, Signal};
use super::rooms::{CloseReason, RoomManager};
use super::{ConnectionId, RoomId};
use crate::error::SessionError;
use chrono::{DateTime, Duration, Utc};
use tandem_protocol::{ClientMessage, Role, ServerMessage, SessionStats};

/// Knobs for pairing and teardown behavior
#[derive(Debug, Clone)]
pub struct MatchmakerOptions {
    pub policy: MatchPolicy,
    pub relax_after: Duration,
    /// `None` means queued connections wait forever
    pub queue_timeout: Option<Duration>,
    /// Put the member left behind back in the queue when a room closes
    pub requeue_partner: bool,
}

impl Default for MatchmakerOptions {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::Strict,
            relax_after: Duration::seconds(30),
            queue_timeout: None,
            requeue_partner: false,
        }
    }
}

/// Everything that can happen to a connection
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Client(ClientMessage),
    Disconnect,
}

impl From<ClientMessage> for InboundEvent {
    fn from(message: ClientMessage) -> Self {
        InboundEvent::Client(message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: ConnectionId,
    pub message: ServerMessage,
}

impl Outbound {
    fn new(to: ConnectionId, message: ServerMessage) -> Self {
        Self { to, message }
    }
}

/// Owns the registry, queue and rooms, and turns inbound events into
/// outbound messages.
///
/// Nothing here does I/O. Callers serialize access and deliver the returned
/// messages in order.
pub struct Matchmaker {
    registry: ConnectionRegistry,
    queue: MatchmakingQueue,
    rooms: RoomManager,
    options: MatchmakerOptions,
}

impl Matchmaker {
    pub fn new(options: MatchmakerOptions) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            queue: MatchmakingQueue::new(options.policy, options.relax_after),
            rooms: RoomManager::new(),
            options,
        }
    }

    pub fn connect(&mut self, now: DateTime<Utc>) -> ConnectionId {
        let id = self.registry.register(now);
        tracing::debug!("Connection {} registered", id);
        id
    }

    pub fn dispatch(
        &mut self,
        from: ConnectionId,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Vec<Outbound> {
        let mut out = Vec::new();

        let result = match event {
            InboundEvent::Client(ClientMessage::JoinQueue {
                native_language,
                target_language,
            }) => self.on_join(
                from,
                native_language.as_deref(),
                target_language.as_deref(),
                now,
                &mut out,
            ),
            InboundEvent::Client(ClientMessage::Offer { sdp }) => {
                self.on_signal(from, Signal::Offer(sdp), &mut out)
            }
            InboundEvent::Client(ClientMessage::Answer { sdp }) => {
                self.on_signal(from, Signal::Answer(sdp), &mut out)
            }
            InboundEvent::Client(ClientMessage::Candidate { candidate }) => {
                self.on_signal(from, Signal::IceCandidate(candidate), &mut out)
            }
            InboundEvent::Client(ClientMessage::Ready) => {
                self.on_signal(from, Signal::Ready, &mut out)
            }
            InboundEvent::Client(ClientMessage::Renegotiate) => {
                self.on_signal(from, Signal::Renegotiate, &mut out)
            }
            InboundEvent::Client(ClientMessage::Stop) => self.on_stop(from, now, &mut out),
            InboundEvent::Client(ClientMessage::NextPartner) => self.on_skip(from, now, &mut out),
            InboundEvent::Client(ClientMessage::Ping) => {
                out.push(Outbound::new(from, ServerMessage::Pong));
                Ok(())
            }
            InboundEvent::Disconnect => self.on_disconnect(from, now, &mut out),
        };

        if let Err(e) = result {
            self.report(from, e, &mut out);
        }

        out
    }

    /// Periodic queue maintenance: timeouts first, then relaxed pairing
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Outbound> {
        let mut out = Vec::new();

        if let Some(timeout) = self.options.queue_timeout {
            for entry in self.queue.expire(now, timeout) {
                tracing::info!(
                    "Connection {} left the queue after waiting {}s",
                    entry.connection_id,
                    (now - entry.enqueued_at).num_seconds()
                );
                self.registry
                    .set_state(entry.connection_id, ConnectionState::Idle);
                out.push(Outbound::new(entry.connection_id, ServerMessage::QueueTimeout));
            }
        }

        for pairing in self.queue.sweep(now) {
            self.open_room(pairing, now, &mut out);
        }

        out
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            online: self.registry.len(),
            queued: self.queue.len(),
            active_rooms: self.rooms.len(),
            total_matches: self.rooms.total_created(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    fn state_of(&self, id: ConnectionId) -> Result<ConnectionState, SessionError> {
        self.registry.state(id).ok_or(SessionError::UnknownTarget)
    }

    fn on_join(
        &mut self,
        from: ConnectionId,
        native: Option<&str>,
        target: Option<&str>,
        now: DateTime<Utc>,
        out: &mut Vec<Outbound>,
    ) -> Result<(), SessionError> {
        match self.state_of(from)? {
            ConnectionState::Idle => {}
            ConnectionState::Queued => {
                return Err(SessionError::ProtocolViolation(
                    "join while already queued".to_string(),
                ));
            }
            ConnectionState::InRoom(_) => {
                return Err(SessionError::ProtocolViolation(
                    "join while in a room".to_string(),
                ));
            }
        }

        let preferences = Preferences::parse(native, target)?;
        self.registry.set_preferences(from, preferences);
        tracing::info!(
            "Connection {} joined the queue ({} -> {})",
            from,
            preferences.native.code(),
            preferences.target.code()
        );

        self.enqueue(from, preferences, None, now, out);
        Ok(())
    }

    fn on_signal(
        &mut self,
        from: ConnectionId,
        signal: Signal,
        out: &mut Vec<Outbound>,
    ) -> Result<(), SessionError> {
        let ConnectionState::InRoom(room_id) = self.state_of(from)? else {
            return Err(SessionError::UnknownTarget);
        };

        let room = self
            .rooms
            .room_mut(room_id)
            .ok_or(SessionError::UnknownTarget)?;

        // Check the partner is still live before touching the room's state
        let partner = room.partner_of(from).ok_or(SessionError::UnknownTarget)?;
        if self.registry.state(partner) != Some(ConnectionState::InRoom(room_id)) {
            return Err(SessionError::UnknownTarget);
        }

        let kind = signal.kind();
        let relayed = relay::relay(room, from, signal)?;
        tracing::debug!("Relayed {} in room {} from {} to {}", kind, room_id, from, relayed.to);

        out.push(Outbound::new(relayed.to, relayed.message));
        Ok(())
    }

    fn on_stop(
        &mut self,
        from: ConnectionId,
        now: DateTime<Utc>,
        out: &mut Vec<Outbound>,
    ) -> Result<(), SessionError> {
        let state = self
            .registry
            .state(from)
            .ok_or(SessionError::DuplicateTeardown(from))?;

        match state {
            ConnectionState::Idle => return Err(SessionError::DuplicateTeardown(from)),
            ConnectionState::Queued => {
                self.queue.dequeue(from);
                self.registry.set_state(from, ConnectionState::Idle);
                tracing::info!("Connection {} left the queue", from);
            }
            ConnectionState::InRoom(room_id) => {
                if let Some(partner) = self.close_room(room_id, from, CloseReason::Stop, now, out) {
                    self.requeue_partner(partner, from, now, out);
                }
            }
        }

        out.push(Outbound::new(from, ServerMessage::Stopped));
        Ok(())
    }

    fn on_skip(
        &mut self,
        from: ConnectionId,
        now: DateTime<Utc>,
        out: &mut Vec<Outbound>,
    ) -> Result<(), SessionError> {
        let room_id = match self.state_of(from)? {
            ConnectionState::InRoom(room_id) => room_id,
            ConnectionState::Queued => {
                tracing::debug!("Connection {} skipped while still waiting", from);
                return Ok(());
            }
            ConnectionState::Idle => {
                return Err(SessionError::ProtocolViolation(
                    "skip without a partner".to_string(),
                ));
            }
        };

        let Some(partner) = self.close_room(room_id, from, CloseReason::Skip, now, out) else {
            return Ok(());
        };

        if let Some(preferences) = self.registry.preferences(from) {
            self.enqueue(from, preferences, Some(partner), now, out);
        }
        self.requeue_partner(partner, from, now, out);
        Ok(())
    }

    fn on_disconnect(
        &mut self,
        from: ConnectionId,
        now: DateTime<Utc>,
        out: &mut Vec<Outbound>,
    ) -> Result<(), SessionError> {
        let connection = self
            .registry
            .unregister(from)
            .ok_or(SessionError::DuplicateTeardown(from))?;

        match connection.state {
            ConnectionState::Idle => {}
            ConnectionState::Queued => {
                self.queue.dequeue(from);
            }
            ConnectionState::InRoom(room_id) => {
                let reason = CloseReason::Disconnect;
                if let Some(partner) = self.close_room(room_id, from, reason, now, out) {
                    self.requeue_partner(partner, from, now, out);
                }
            }
        }

        tracing::info!(
            "Connection {} unregistered after {}s",
            from,
            (now - connection.connected_at).num_seconds()
        );
        Ok(())
    }

    fn enqueue(
        &mut self,
        id: ConnectionId,
        preferences: Preferences,
        avoid: Option<ConnectionId>,
        now: DateTime<Utc>,
        out: &mut Vec<Outbound>,
    ) {
        match self.queue.enqueue(id, preferences, avoid, now) {
            Some(pairing) => self.open_room(pairing, now, out),
            None => {
                self.registry.set_state(id, ConnectionState::Queued);
                out.push(Outbound::new(id, ServerMessage::Waiting));
            }
        }
    }

    fn open_room(&mut self, pairing: Pairing, now: DateTime<Utc>, out: &mut Vec<Outbound>) {
        let caller = pairing.first.connection_id;
        let callee = pairing.second.connection_id;

        let Some(room_id) = self.rooms.create_room(caller, callee, now) else {
            tracing::error!("Refused to open a room for {} and {}", caller, callee);
            for id in [caller, callee] {
                self.registry.set_state(id, ConnectionState::Idle);
            }
            return;
        };

        self.registry
            .set_state(caller, ConnectionState::InRoom(room_id));
        self.registry
            .set_state(callee, ConnectionState::InRoom(room_id));

        tracing::info!(
            "Room {} opened: caller {} callee {}",
            room_id,
            caller,
            callee
        );

        out.push(Outbound::new(
            caller,
            ServerMessage::Matched {
                room: room_id,
                role: Role::Caller,
            },
        ));
        out.push(Outbound::new(
            callee,
            ServerMessage::Matched {
                room: room_id,
                role: Role::Callee,
            },
        ));
    }

    /// Tear down a room and notify whoever did not start the teardown.
    ///
    /// Returns the partner, or `None` when the room was already gone.
    fn close_room(
        &mut self,
        room_id: RoomId,
        initiator: ConnectionId,
        reason: CloseReason,
        now: DateTime<Utc>,
        out: &mut Vec<Outbound>,
    ) -> Option<ConnectionId> {
        let room = self.rooms.close_room(room_id)?;
        let partner = room.partner_of(initiator)?;

        self.registry.set_state(initiator, ConnectionState::Idle);
        self.registry.set_state(partner, ConnectionState::Idle);

        tracing::info!(
            "Room {} closed by {} ({:?}) after {}s",
            room_id,
            initiator,
            reason,
            (now - room.created_at).num_seconds()
        );

        out.push(Outbound::new(partner, reason.partner_notice()));
        Some(partner)
    }

    fn requeue_partner(
        &mut self,
        partner: ConnectionId,
        left_by: ConnectionId,
        now: DateTime<Utc>,
        out: &mut Vec<Outbound>,
    ) {
        if !self.options.requeue_partner {
            return;
        }
        if let Some(preferences) = self.registry.preferences(partner) {
            self.enqueue(partner, preferences, Some(left_by), now, out);
        }
    }

    fn report(&self, from: ConnectionId, error: SessionError, out: &mut Vec<Outbound>) {
        match error {
            SessionError::ProtocolViolation(reason) => {
                tracing::warn!("Dropped message from {}: {}", from, reason);
            }
            SessionError::UnknownTarget => {
                tracing::debug!("Nothing to relay to for {}", from);
                out.push(Outbound::new(from, ServerMessage::PartnerGone));
            }
            SessionError::DuplicateTeardown(id) => {
                tracing::debug!("Ignoring repeated teardown for {}", id);
            }
            SessionError::PreferenceMismatch(message) => {
                tracing::info!("Rejected preferences from {}: {}", from, message);
                out.push(Outbound::new(from, ServerMessage::Error { message }));
            }
        }
    }
}
