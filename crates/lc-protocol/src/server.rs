//! Events sent by the live-class controller to clients.

use crate::envelope::{self, Frame};
use crate::error::ProtocolError;
use crate::ids::{Role, UserId};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

pub const PARTICIPANTS_UPDATED: &str = "participants-updated";
pub const NEW_MESSAGE: &str = "new-message";
pub const STUDENT_RAISED_HAND: &str = "student-raised-hand";
pub const INSTRUCTOR_STREAM_READY: &str = "instructor-stream-ready";
pub const STUDENT_REQUEST_STREAM: &str = "student-request-stream";
pub const PEER_SIGNAL: &str = "peer-signal";
pub const EVENT_REJECTED: &str = "event-rejected";

/// Public fields of one participant in a roster snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub hand_raised: bool,
    /// Join time in milliseconds since the Unix epoch.
    pub joined_at: i64,
}

/// `participants-updated` payload: the full roster in join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub participants: Vec<ParticipantView>,
}

impl RosterSnapshot {
    /// User ids in roster order.
    #[must_use]
    pub fn user_ids(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.user_id.as_str()).collect()
    }
}

/// `new-message` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Per-room sequence number assigned by the relay, starting at 1.
    pub id: u64,
    /// Id the sender attached to its draft, echoed back unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
    pub user_id: UserId,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub content: String,
    /// Relay arrival time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// `student-raised-hand` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandRaised {
    pub user_id: UserId,
    pub raised: bool,
}

/// `instructor-stream-ready` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamReady {
    pub instructor_id: UserId,
}

/// `student-request-stream` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub student_id: UserId,
}

/// `peer-signal` payload as delivered to the recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSignalDelivery {
    pub from_user_id: UserId,
    pub payload: Box<RawValue>,
}

/// `event-rejected` payload, sent only to the originating connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRejected {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    pub code: i32,
    pub reason: String,
}

/// An event delivered to clients.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    ParticipantsUpdated(RosterSnapshot),
    NewMessage(ChatMessage),
    StudentRaisedHand(HandRaised),
    InstructorStreamReady(StreamReady),
    StudentRequestStream(StreamRequest),
    PeerSignal(PeerSignalDelivery),
    EventRejected(EventRejected),
}

impl ServerEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ServerEvent::ParticipantsUpdated(_) => PARTICIPANTS_UPDATED,
            ServerEvent::NewMessage(_) => NEW_MESSAGE,
            ServerEvent::StudentRaisedHand(_) => STUDENT_RAISED_HAND,
            ServerEvent::InstructorStreamReady(_) => INSTRUCTOR_STREAM_READY,
            ServerEvent::StudentRequestStream(_) => STUDENT_REQUEST_STREAM,
            ServerEvent::PeerSignal(_) => PEER_SIGNAL,
            ServerEvent::EventRejected(_) => EVENT_REJECTED,
        }
    }

    /// Encode the event as a text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Encode` if serialization fails.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        let name = self.name();
        match self {
            ServerEvent::ParticipantsUpdated(p) => envelope::encode(name, p),
            ServerEvent::NewMessage(p) => envelope::encode(name, p),
            ServerEvent::StudentRaisedHand(p) => envelope::encode(name, p),
            ServerEvent::InstructorStreamReady(p) => envelope::encode(name, p),
            ServerEvent::StudentRequestStream(p) => envelope::encode(name, p),
            ServerEvent::PeerSignal(p) => envelope::encode(name, p),
            ServerEvent::EventRejected(p) => envelope::encode(name, p),
        }
    }

    /// Decode a text frame received from the controller.
    ///
    /// # Errors
    ///
    /// Returns a `ProtocolError` if the frame is malformed, names an unknown
    /// event, or carries a payload that does not match the event.
    pub fn from_frame(text: &str) -> Result<Self, ProtocolError> {
        let frame = Frame::parse(text)?;

        Ok(match frame.event.as_str() {
            PARTICIPANTS_UPDATED => ServerEvent::ParticipantsUpdated(frame.decode_data()?),
            NEW_MESSAGE => ServerEvent::NewMessage(frame.decode_data()?),
            STUDENT_RAISED_HAND => ServerEvent::StudentRaisedHand(frame.decode_data()?),
            INSTRUCTOR_STREAM_READY => ServerEvent::InstructorStreamReady(frame.decode_data()?),
            STUDENT_REQUEST_STREAM => ServerEvent::StudentRequestStream(frame.decode_data()?),
            PEER_SIGNAL => ServerEvent::PeerSignal(frame.decode_data()?),
            EVENT_REJECTED => ServerEvent::EventRejected(frame.decode_data()?),
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roster_wire_shape() {
        let event = ServerEvent::ParticipantsUpdated(RosterSnapshot {
            participants: vec![ParticipantView {
                user_id: UserId::from("u-1"),
                name: "Ada".to_string(),
                avatar: None,
                role: Role::Instructor,
                hand_raised: false,
                joined_at: 1_700_000_000_000,
            }],
        });

        let value: serde_json::Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "participants-updated",
                "data": {"participants": [{
                    "userId": "u-1",
                    "name": "Ada",
                    "avatar": null,
                    "role": "instructor",
                    "handRaised": false,
                    "joinedAt": 1_700_000_000_000_i64
                }]}
            })
        );
    }

    #[test]
    fn test_chat_message_omits_absent_client_id() {
        let event = ServerEvent::NewMessage(ChatMessage {
            id: 1,
            client_message_id: None,
            user_id: UserId::from("u-1"),
            user_name: "Ada".to_string(),
            user_avatar: None,
            content: "Hello".to_string(),
            timestamp: 5,
        });

        let text = event.to_frame().unwrap();
        assert!(!text.contains("clientMessageId"));

        let ServerEvent::NewMessage(decoded) = ServerEvent::from_frame(&text).unwrap() else {
            panic!("expected new-message");
        };
        assert_eq!(decoded.id, 1);
        assert_eq!(decoded.content, "Hello");
    }

    #[test]
    fn test_peer_signal_payload_reencoded_verbatim() {
        let payload = RawValue::from_string(r#"{"candidate":"a=1",  "x":[1, 2]}"#.to_string())
            .unwrap();
        let event = ServerEvent::PeerSignal(PeerSignalDelivery {
            from_user_id: UserId::from("a"),
            payload,
        });

        let text = event.to_frame().unwrap();
        assert!(text.contains(r#""payload":{"candidate":"a=1",  "x":[1, 2]}"#));
    }

    #[test]
    fn test_stream_events_field_names() {
        let ready = ServerEvent::InstructorStreamReady(StreamReady {
            instructor_id: UserId::from("t"),
        })
        .to_frame()
        .unwrap();
        assert!(ready.contains(r#""instructorId":"t""#));

        let request = ServerEvent::StudentRequestStream(StreamRequest {
            student_id: UserId::from("s"),
        })
        .to_frame()
        .unwrap();
        assert!(request.contains(r#""studentId":"s""#));
    }

    #[test]
    fn test_rejection_decodes() {
        let text = r#"{"event":"event-rejected","data":{"event":"join-room","code":1,"reason":"bad"}}"#;
        let ServerEvent::EventRejected(rejected) = ServerEvent::from_frame(text).unwrap() else {
            panic!("expected event-rejected");
        };
        assert_eq!(rejected.event.as_deref(), Some("join-room"));
        assert_eq!(rejected.code, 1);
    }

    #[test]
    fn test_client_event_name_is_not_a_server_event() {
        let text = r#"{"event":"join-room","data":{}}"#;
        assert!(matches!(
            ServerEvent::from_frame(text),
            Err(ProtocolError::UnknownEvent(_))
        ));
    }
}
