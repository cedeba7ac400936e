//! Matchmaking and signaling core
//!
//! Connections register, declare a language pair, wait in the queue until a
//! mirror partner shows up, and then exchange offer/answer/ICE through their
//! room. All of it is plain in-memory state owned by [`Matchmaker`]; the
//! async wrapper in `services::session` provides the single lock around it.

mod controller;
mod queue;
mod registry;
mod relay;
mod rooms;

use uuid::Uuid;

pub use controller::{InboundEvent, Matchmaker, MatchmakerOptions, Outbound};
pub use queue::{MatchPolicy, MatchmakingQueue, Pairing, QueueEntry};
pub use registry::{Connection, ConnectionRegistry, ConnectionState, Preferences};
pub use relay::{Relayed, Signal, SignalingState};
pub use rooms::{CloseReason, Room, RoomManager};

/// Transport-session handle, valid from connect until disconnect
pub type ConnectionId = Uuid;

pub type RoomId = Uuid;
