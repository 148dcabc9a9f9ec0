//! Events sent by clients to the live-class controller.

use crate::envelope::{self, Frame};
use crate::error::ProtocolError;
use crate::ids::{RoomId, UserId, UserProfile};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

pub const JOIN_ROOM: &str = "join-room";
pub const LEAVE_ROOM: &str = "leave-room";
pub const SEND_MESSAGE: &str = "send-message";
pub const RAISE_HAND: &str = "raise-hand";
pub const BROADCAST_READY: &str = "broadcast-ready";
pub const REQUEST_STREAM: &str = "request-stream";
pub const PEER_SIGNAL: &str = "peer-signal";

/// `join-room` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: RoomId,
    pub user: UserProfile,
}

/// `leave-room` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoom {
    pub room_id: RoomId,
    pub user_id: UserId,
}

/// `send-message` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub room_id: RoomId,
    pub message: ChatDraft,
}

/// A chat message as composed by the client.
///
/// The client's `id` and `timestamp` do not order anything: the relay
/// assigns the sequence number and send time. The client id is echoed back
/// so senders can match their optimistic copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDraft {
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    pub content: String,
}

/// `raise-hand` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseHand {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub raised: bool,
}

/// `broadcast-ready` and `request-stream` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamIntent {
    pub room_id: RoomId,
    pub user_id: UserId,
}

/// `peer-signal` payload.
///
/// `payload` is kept as raw JSON and is never inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSignal {
    pub room_id: RoomId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub payload: Box<RawValue>,
}

/// Client message ids arrive as strings or numbers depending on the client.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// An event received from a client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    JoinRoom(JoinRoom),
    LeaveRoom(LeaveRoom),
    SendMessage(SendMessage),
    RaiseHand(RaiseHand),
    BroadcastReady(StreamIntent),
    RequestStream(StreamIntent),
    PeerSignal(PeerSignal),
}

impl ClientEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => JOIN_ROOM,
            ClientEvent::LeaveRoom(_) => LEAVE_ROOM,
            ClientEvent::SendMessage(_) => SEND_MESSAGE,
            ClientEvent::RaiseHand(_) => RAISE_HAND,
            ClientEvent::BroadcastReady(_) => BROADCAST_READY,
            ClientEvent::RequestStream(_) => REQUEST_STREAM,
            ClientEvent::PeerSignal(_) => PEER_SIGNAL,
        }
    }

    /// The room the event is addressed to.
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        match self {
            ClientEvent::JoinRoom(p) => &p.room_id,
            ClientEvent::LeaveRoom(p) => &p.room_id,
            ClientEvent::SendMessage(p) => &p.room_id,
            ClientEvent::RaiseHand(p) => &p.room_id,
            ClientEvent::BroadcastReady(p) | ClientEvent::RequestStream(p) => &p.room_id,
            ClientEvent::PeerSignal(p) => &p.room_id,
        }
    }

    /// Decode and validate a text frame.
    ///
    /// # Errors
    ///
    /// - `MalformedFrame` if the frame is not an envelope
    /// - `UnknownEvent` if the event name is not a client event
    /// - `InvalidPayload` if required fields are missing or blank
    pub fn from_frame(text: &str) -> Result<Self, ProtocolError> {
        let frame = Frame::parse(text)?;

        let event = match frame.event.as_str() {
            JOIN_ROOM => ClientEvent::JoinRoom(frame.decode_data()?),
            LEAVE_ROOM => ClientEvent::LeaveRoom(frame.decode_data()?),
            SEND_MESSAGE => ClientEvent::SendMessage(frame.decode_data()?),
            RAISE_HAND => ClientEvent::RaiseHand(frame.decode_data()?),
            BROADCAST_READY => ClientEvent::BroadcastReady(frame.decode_data()?),
            REQUEST_STREAM => ClientEvent::RequestStream(frame.decode_data()?),
            PEER_SIGNAL => ClientEvent::PeerSignal(frame.decode_data()?),
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };

        event.validate()?;
        Ok(event)
    }

    /// Encode the event as a text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Encode` if serialization fails.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        match self {
            ClientEvent::JoinRoom(p) => envelope::encode(JOIN_ROOM, p),
            ClientEvent::LeaveRoom(p) => envelope::encode(LEAVE_ROOM, p),
            ClientEvent::SendMessage(p) => envelope::encode(SEND_MESSAGE, p),
            ClientEvent::RaiseHand(p) => envelope::encode(RAISE_HAND, p),
            ClientEvent::BroadcastReady(p) => envelope::encode(BROADCAST_READY, p),
            ClientEvent::RequestStream(p) => envelope::encode(REQUEST_STREAM, p),
            ClientEvent::PeerSignal(p) => envelope::encode(PEER_SIGNAL, p),
        }
    }

    /// Field checks that structural decoding cannot express.
    fn validate(&self) -> Result<(), ProtocolError> {
        let name = self.name();
        let require_user = |field: &str, id: &UserId| {
            if id.is_blank() {
                Err(ProtocolError::invalid(name, format!("{field} must not be empty")))
            } else {
                Ok(())
            }
        };

        match self {
            ClientEvent::JoinRoom(p) => require_user("user.id", &p.user.id),
            ClientEvent::LeaveRoom(p) => require_user("userId", &p.user_id),
            ClientEvent::SendMessage(p) => {
                require_user("message.userId", &p.message.user_id)?;
                if p.message.content.trim().is_empty() {
                    return Err(ProtocolError::invalid(
                        name,
                        "message.content must not be empty",
                    ));
                }
                Ok(())
            }
            ClientEvent::RaiseHand(p) => require_user("userId", &p.user_id),
            ClientEvent::BroadcastReady(p) | ClientEvent::RequestStream(p) => {
                require_user("userId", &p.user_id)
            }
            ClientEvent::PeerSignal(p) => {
                require_user("fromUserId", &p.from_user_id)?;
                require_user("toUserId", &p.to_user_id)
            }
        }
    }
}
