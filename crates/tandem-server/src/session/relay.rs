//! Offer/answer/ICE relay
//!
//! Each room carries one [`SignalingState`]. The relay validates a signal
//! against that state and the sender's role, advances it, and names the peer
//! the signal must be forwarded to. Payloads are moved through untouched.

use super::rooms::Room;
use super::ConnectionId;
use crate::error::SessionError;
use serde_json::Value;
use tandem_protocol::{Role, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalingState {
    #[default]
    Empty,
    OfferPending,
    AnswerPending,
    Ready,
}

#[derive(Debug, Clone)]
pub enum Signal {
    Offer(Value),
    Answer(Value),
    IceCandidate(Value),
    Ready,
    Renegotiate,
}

impl Signal {
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Offer(_) => "offer",
            Signal::Answer(_) => "answer",
            Signal::IceCandidate(_) => "candidate",
            Signal::Ready => "ready",
            Signal::Renegotiate => "renegotiate",
        }
    }

    fn into_message(self) -> ServerMessage {
        match self {
            Signal::Offer(sdp) => ServerMessage::Offer { sdp },
            Signal::Answer(sdp) => ServerMessage::Answer { sdp },
            Signal::IceCandidate(candidate) => ServerMessage::Candidate { candidate },
            Signal::Ready => ServerMessage::Ready,
            Signal::Renegotiate => ServerMessage::Renegotiate,
        }
    }
}

impl SignalingState {
    /// Next state after `sender` emits `signal`, or why it is refused.
    ///
    /// ICE candidates never change the state and are accepted in all of them.
    pub fn advance(self, sender: Role, signal: &Signal) -> Result<SignalingState, SessionError> {
        use SignalingState::*;

        match (signal, sender, self) {
            (Signal::IceCandidate(_), _, state) => Ok(state),
            (Signal::Offer(_), Role::Caller, Empty) => Ok(OfferPending),
            (Signal::Answer(_), Role::Callee, OfferPending) => Ok(AnswerPending),
            (Signal::Ready, _, AnswerPending | Ready) => Ok(Ready),
            (Signal::Renegotiate, Role::Caller, Ready) => Ok(Empty),
            (signal, sender, state) => Err(SessionError::ProtocolViolation(format!(
                "{} from {:?} not allowed in state {:?}",
                signal.kind(),
                sender,
                state
            ))),
        }
    }
}

/// A signal accepted by the relay, addressed to the other room member
#[derive(Debug, Clone, PartialEq)]
pub struct Relayed {
    pub to: ConnectionId,
    pub message: ServerMessage,
}

/// Validate `signal` from `from` and advance the room's state.
///
/// On error the room is left exactly as it was.
pub fn relay(room: &mut Room, from: ConnectionId, signal: Signal) -> Result<Relayed, SessionError> {
    let role = room.role_of(from).ok_or(SessionError::UnknownTarget)?;
    room.signaling = room.signaling.advance(role, &signal)?;

    Ok(Relayed {
        to: room.member(role.opposite()),
        message: signal.into_message(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn room() -> Room {
        Room {
            id: Uuid::new_v4(),
            caller: Uuid::new_v4(),
            callee: Uuid::new_v4(),
            created_at: Utc::now(),
            signaling: SignalingState::Empty,
        }
    }

    #[test]
    fn test_full_negotiation() {
        let mut room = room();
        let (caller, callee) = (room.caller, room.callee);
        let offer = json!({ "type": "offer", "sdp": "v=0" });

        let out = relay(&mut room, caller, Signal::Offer(offer.clone())).unwrap();
        assert_eq!(out.to, callee);
        assert_eq!(out.message, ServerMessage::Offer { sdp: offer });
        assert_eq!(room.signaling, SignalingState::OfferPending);

        let out = relay(&mut room, callee, Signal::Answer(json!("answer"))).unwrap();
        assert_eq!(out.to, caller);
        assert_eq!(room.signaling, SignalingState::AnswerPending);

        let out = relay(&mut room, caller, Signal::Ready).unwrap();
        assert_eq!(out.to, callee);
        assert_eq!(out.message, ServerMessage::Ready);
        assert_eq!(room.signaling, SignalingState::Ready);

        // The other side may confirm too
        let out = relay(&mut room, callee, Signal::Ready).unwrap();
        assert_eq!(out.to, caller);
        assert_eq!(room.signaling, SignalingState::Ready);
    }

    #[test]
    fn test_second_offer_is_rejected() {
        let mut room = room();
        let (caller, callee) = (room.caller, room.callee);

        relay(&mut room, caller, Signal::Offer(json!("first"))).unwrap();

        let err = relay(&mut room, callee, Signal::Offer(json!("second"))).unwrap_err();
        assert!(matches!(err, SessionError::ProtocolViolation(_)));
        let err = relay(&mut room, caller, Signal::Offer(json!("third"))).unwrap_err();
        assert!(matches!(err, SessionError::ProtocolViolation(_)));
        assert_eq!(room.signaling, SignalingState::OfferPending);
    }

    #[test]
    fn test_out_of_order_messages_leave_state_untouched() {
        let mut room = room();
        let (caller, callee) = (room.caller, room.callee);

        assert!(relay(&mut room, callee, Signal::Offer(json!("x"))).is_err());
        assert!(relay(&mut room, callee, Signal::Answer(json!("x"))).is_err());
        assert!(relay(&mut room, caller, Signal::Ready).is_err());
        assert!(relay(&mut room, caller, Signal::Renegotiate).is_err());
        assert_eq!(room.signaling, SignalingState::Empty);

        relay(&mut room, caller, Signal::Offer(json!("x"))).unwrap();
        assert!(relay(&mut room, caller, Signal::Answer(json!("x"))).is_err());
        assert!(relay(&mut room, callee, Signal::Ready).is_err());
        assert_eq!(room.signaling, SignalingState::OfferPending);
    }

    #[test]
    fn test_candidates_pass_in_every_state() {
        let mut room = room();
        let (caller, callee) = (room.caller, room.callee);

        for state in [
            SignalingState::Empty,
            SignalingState::OfferPending,
            SignalingState::AnswerPending,
            SignalingState::Ready,
        ] {
            room.signaling = state;
            let out = relay(&mut room, callee, Signal::IceCandidate(json!({ "c": 1 }))).unwrap();
            assert_eq!(out.to, caller);
            assert_eq!(room.signaling, state);
        }
    }

    #[test]
    fn test_explicit_renegotiation() {
        let mut room = room();
        let (caller, callee) = (room.caller, room.callee);
        room.signaling = SignalingState::Ready;

        assert!(relay(&mut room, callee, Signal::Renegotiate).is_err());

        let out = relay(&mut room, caller, Signal::Renegotiate).unwrap();
        assert_eq!(out.to, callee);
        assert_eq!(out.message, ServerMessage::Renegotiate);
        assert_eq!(room.signaling, SignalingState::Empty);

        relay(&mut room, caller, Signal::Offer(json!("again"))).unwrap();
        assert_eq!(room.signaling, SignalingState::OfferPending);
    }

    #[test]
    fn test_stranger_is_unknown_target() {
        let mut room = room();
        let err = relay(&mut room, Uuid::new_v4(), Signal::Ready).unwrap_err();
        assert_eq!(err, SessionError::UnknownTarget);
    }
}
