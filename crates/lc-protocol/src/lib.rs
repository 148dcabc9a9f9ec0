//! Live Class wire protocol.
//!
//! Every WebSocket text frame exchanged with the live-class controller is a
//! JSON envelope:
//!
//! ```text
//! {"event": "join-room", "data": {"roomId": "class-42", "user": {...}}}
//! ```
//!
//! Decoding is two-phase. The envelope is parsed first with `data` kept as
//! raw JSON, then `data` is parsed into the record for that event name. This
//! lets a rejection name the offending event, and lets `peer-signal`
//! payloads travel through the controller byte-for-byte.
//!
//! # Modules
//!
//! - [`ids`] - Room and user identifiers, participant roles
//! - [`client`] - Client → controller events ([`ClientEvent`])
//! - [`server`] - Controller → client events ([`ServerEvent`])
//! - [`envelope`] - Frame encoding and decoding
//! - [`error`] - Protocol errors

pub mod client;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod server;

pub use client::{
    ChatDraft, ClientEvent, JoinRoom, LeaveRoom, PeerSignal, RaiseHand, SendMessage, StreamIntent,
};
pub use error::ProtocolError;
pub use ids::{RoomId, Role, UserId, UserProfile};
pub use server::{
    ChatMessage, EventRejected, HandRaised, ParticipantView, PeerSignalDelivery, RosterSnapshot,
    ServerEvent, StreamReady, StreamRequest,
};
