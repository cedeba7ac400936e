use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::Role;

/// Messages sent from client to server via WebSocket
///
/// The room a message belongs to is implied by the connection that sent it,
/// so any `room` field a client includes is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Declare language preferences and wait for a partner
    #[serde(alias = "joinRoom", rename_all = "camelCase")]
    JoinQueue {
        native_language: Option<String>,
        target_language: Option<String>,
    },

    /// Session description offer, caller only
    Offer { sdp: Value },

    /// Session description answer, callee only
    Answer { sdp: Value },

    /// Trickled ICE candidate, either side
    Candidate { candidate: Value },

    /// Local negotiation finished
    Ready,

    /// Caller asks to start a fresh offer/answer exchange
    Renegotiate,

    /// Leave the current room or the queue
    #[serde(alias = "leaveRoom")]
    Stop,

    /// Leave the current room and look for someone else
    #[serde(alias = "skip")]
    NextPartner,

    /// Keep-alive
    Ping,
}

/// Messages sent from server to client via WebSocket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Sent once right after the socket is accepted
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: Uuid },

    /// Queued, no compatible partner yet
    Waiting,

    /// Paired with a partner
    Matched { room: Uuid, role: Role },

    /// Offer relayed from the caller
    Offer { sdp: Value },

    /// Answer relayed from the callee
    Answer { sdp: Value },

    /// ICE candidate relayed from the partner
    Candidate { candidate: Value },

    /// Partner finished local negotiation
    Ready,

    /// Caller restarted negotiation; expect a new offer
    Renegotiate,

    /// Partner's connection went away
    UserDisconnected,

    /// Partner skipped to someone else
    PartnerNext,

    /// Partner stopped the call
    PartnerStopped,

    /// Acknowledges our own stop
    Stopped,

    /// Waited in the queue longer than the server allows
    QueueTimeout,

    /// Nobody on the other end to relay to
    PartnerGone,

    /// Request rejected; nothing changed
    Error { message: String },

    /// Keep-alive response
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_room_alias_and_camel_case_fields() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "joinRoom",
            "nativeLanguage": "en",
            "targetLanguage": "pt"
        }))
        .unwrap();

        match msg {
            ClientMessage::JoinQueue {
                native_language,
                target_language,
            } => {
                assert_eq!(native_language.as_deref(), Some("en"));
                assert_eq!(target_language.as_deref(), Some("pt"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_missing_preference_still_parses() {
        let msg: ClientMessage =
            serde_json::from_value(json!({ "type": "joinQueue", "nativeLanguage": "en" })).unwrap();

        assert!(matches!(
            msg,
            ClientMessage::JoinQueue {
                target_language: None,
                ..
            }
        ));
    }

    #[test]
    fn test_skip_alias_and_room_field_ignored() {
        let msg: ClientMessage =
            serde_json::from_value(json!({ "type": "skip", "room": "whatever" })).unwrap();
        assert!(matches!(msg, ClientMessage::NextPartner));
    }

    #[test]
    fn test_leave_room_alias_is_stop() {
        let msg: ClientMessage =
            serde_json::from_value(json!({ "type": "leaveRoom", "room": "r" })).unwrap();
        assert!(matches!(msg, ClientMessage::Stop));

        // Outbound name stays canonical
        let value = serde_json::to_value(ClientMessage::Stop).unwrap();
        assert_eq!(value, json!({ "type": "stop" }));
    }

    #[test]
    fn test_offer_payload_is_kept_verbatim() {
        let sdp = json!({ "type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n" });
        let msg: ClientMessage =
            serde_json::from_value(json!({ "type": "offer", "room": "r", "sdp": sdp.clone() }))
                .unwrap();

        match msg {
            ClientMessage::Offer { sdp: relayed } => assert_eq!(relayed, sdp),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_matched_wire_shape() {
        let room = Uuid::new_v4();
        let value = serde_json::to_value(ServerMessage::Matched {
            room,
            role: Role::Caller,
        })
        .unwrap();

        assert_eq!(
            value,
            json!({ "type": "matched", "room": room.to_string(), "role": "caller" })
        );
    }

    #[test]
    fn test_unit_notifications_are_bare_tags() {
        let value = serde_json::to_value(ServerMessage::UserDisconnected).unwrap();
        assert_eq!(value, json!({ "type": "userDisconnected" }));

        let value = serde_json::to_value(ServerMessage::PartnerNext).unwrap();
        assert_eq!(value, json!({ "type": "partnerNext" }));
    }
}
