//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Request-reply uses `tokio::sync::oneshot`.

use crate::errors::LcError;

use super::connection::ConnectionActorHandle;
use super::room::RoomActorHandle;

use lc_protocol::{ChatDraft, Role, RoomId, UserId, UserProfile};
use serde_json::value::RawValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Server-assigned identifier of one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh connection identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Messages sent to `RoomControllerActor`.
#[derive(Debug)]
pub enum ControllerMessage {
    /// Return the live room for `room_id`, creating it if absent.
    GetOrCreateRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Result<RoomActorHandle, LcError>>,
    },

    /// Return the live room for `room_id` without creating it.
    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Option<RoomActorHandle>>,
    },

    /// Close and forget the room if it has no participants.
    ///
    /// Responds `true` if the room was removed (or was already gone).
    RemoveIfEmpty {
        room_id: RoomId,
        respond_to: oneshot::Sender<Result<bool, LcError>>,
    },

    /// Get controller status (for health checks and tests).
    GetStatus {
        respond_to: oneshot::Sender<ControllerStatus>,
    },

    /// Initiate graceful shutdown.
    Shutdown {
        deadline: Duration,
        respond_to: oneshot::Sender<Result<(), LcError>>,
    },
}

/// Messages sent to `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Add (or re-bind) a participant on the given connection.
    Join {
        connection: ConnectionActorHandle,
        profile: UserProfile,
        respond_to: oneshot::Sender<Result<JoinOutcome, LcError>>,
    },

    /// Explicit leave. Honoured only from the participant's current connection.
    Leave {
        connection_id: ConnectionId,
        user_id: UserId,
        respond_to: oneshot::Sender<bool>,
    },

    /// A connection went away; remove whoever it carried.
    ConnectionClosed { connection_id: ConnectionId },

    /// Relay a chat message to every member.
    PublishChat {
        draft: ChatDraft,
        /// Assigned sequence number, or `None` when nobody received it.
        respond_to: oneshot::Sender<Option<u64>>,
    },

    /// Set a participant's hand state and notify the room.
    PublishHandRaise { user_id: UserId, raised: bool },

    /// Record the broadcaster and notify the other members.
    AnnounceBroadcast { user_id: UserId },

    /// Forward a stream request to the broadcaster.
    RequestStream { user_id: UserId },

    /// Forward an opaque negotiation payload to one member.
    RelayPeerPayload {
        from: UserId,
        to: UserId,
        payload: Box<RawValue>,
    },

    /// Close the room if it is empty. Responds `true` if it closed.
    CloseIfEmpty { respond_to: oneshot::Sender<bool> },

    /// Get current room state.
    GetState {
        respond_to: oneshot::Sender<RoomState>,
    },
}

/// Messages sent to `ConnectionActor`.
#[derive(Debug)]
pub enum ConnectionMessage {
    /// Write an already-encoded frame to the client.
    Deliver { frame: Arc<str> },

    /// Close the connection gracefully.
    Close { reason: String },

    /// Ping the actor to check liveness.
    Ping { respond_to: oneshot::Sender<()> },
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Participants in the room after the join.
    pub participant_count: usize,
    /// Whether the user was already present and only re-bound.
    pub rebound: bool,
}

/// One participant as seen by `GetState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantState {
    pub user_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub hand_raised: bool,
    pub joined_at: i64,
    pub connection_id: ConnectionId,
}

/// Snapshot of a room.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room_id: RoomId,
    /// Participants in join order.
    pub participants: Vec<ParticipantState>,
    pub broadcaster: Option<UserId>,
    /// Sequence number the next chat message will receive.
    pub next_message_id: u64,
    pub created_at: i64,
    /// Messages queued behind the state request.
    pub mailbox_depth: usize,
}

impl RoomState {
    /// User ids in join order.
    #[must_use]
    pub fn user_ids(&self) -> Vec<&str> {
        self.participants
            .iter()
            .map(|p| p.user_id.as_str())
            .collect()
    }
}

/// Controller status.
#[derive(Debug, Clone, Copy)]
pub struct ControllerStatus {
    pub room_count: usize,
    pub connection_count: usize,
    pub is_draining: bool,
    /// Messages queued behind the status request.
    pub mailbox_depth: usize,
}
