use super::relay::SignalingState;
use super::{ConnectionId, RoomId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tandem_protocol::{Role, ServerMessage};
use uuid::Uuid;

/// Why a room was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Stop,
    Skip,
    Disconnect,
}

impl CloseReason {
    /// What the member who stayed behind is told
    pub fn partner_notice(self) -> ServerMessage {
        match self {
            CloseReason::Stop => ServerMessage::PartnerStopped,
            CloseReason::Skip => ServerMessage::PartnerNext,
            CloseReason::Disconnect => ServerMessage::UserDisconnected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub caller: ConnectionId,
    pub callee: ConnectionId,
    pub created_at: DateTime<Utc>,
    pub signaling: SignalingState,
}

impl Room {
    pub fn role_of(&self, connection_id: ConnectionId) -> Option<Role> {
        if connection_id == self.caller {
            Some(Role::Caller)
        } else if connection_id == self.callee {
            Some(Role::Callee)
        } else {
            None
        }
    }

    pub fn member(&self, role: Role) -> ConnectionId {
        match role {
            Role::Caller => self.caller,
            Role::Callee => self.callee,
        }
    }

    pub fn partner_of(&self, connection_id: ConnectionId) -> Option<ConnectionId> {
        self.role_of(connection_id)
            .map(|role| self.member(role.opposite()))
    }
}

/// Active two-party rooms
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,
    members: HashMap<ConnectionId, RoomId>,
    total_created: u64,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a room with fixed roles.
    ///
    /// Refuses (returns `None`) when both sides are the same connection or
    /// either side already sits in a room.
    pub fn create_room(
        &mut self,
        caller: ConnectionId,
        callee: ConnectionId,
        now: DateTime<Utc>,
    ) -> Option<RoomId> {
        if caller == callee
            || self.members.contains_key(&caller)
            || self.members.contains_key(&callee)
        {
            return None;
        }

        let id = Uuid::new_v4();
        self.rooms.insert(
            id,
            Room {
                id,
                caller,
                callee,
                created_at: now,
                signaling: SignalingState::Empty,
            },
        );
        self.members.insert(caller, id);
        self.members.insert(callee, id);
        self.total_created += 1;

        Some(id)
    }

    pub fn room(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn room_mut(&mut self, room_id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&room_id)
    }

    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&Room> {
        self.members
            .get(&connection_id)
            .and_then(|room_id| self.rooms.get(room_id))
    }

    /// Remove the room and both member references. `None` if already gone.
    pub fn close_room(&mut self, room_id: RoomId) -> Option<Room> {
        let room = self.rooms.remove(&room_id)?;
        self.members.remove(&room.caller);
        self.members.remove(&room.callee);
        Some(room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn total_created(&self) -> u64 {
        self.total_created
    }
}
