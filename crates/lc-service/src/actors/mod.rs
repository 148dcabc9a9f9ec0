//! Actor model implementation for the Live Class Controller.
//!
//! ```text
//! RoomControllerActor (singleton per process)
//! └── supervises N RoomActors
//!     └── RoomActor (one per live room)
//!         ├── owns roster, chat sequence and broadcaster
//!         └── fans out to ConnectionActors without awaiting them
//!
//! ConnectionActor (one per WebSocket, cancelled with its room controller)
//! ```
//!
//! # Key Design Decisions
//!
//! - **One room per actor**: per-room state has exactly one owner, so rooms
//!   never block one another and a roster snapshot is never half-applied
//! - **Non-blocking fan-out**: rooms `try_send` into bounded connection
//!   mailboxes; a full mailbox disconnects the slow client
//! - **CancellationToken propagation**: parent actors pass child tokens for
//!   graceful shutdown
//! - **Mailbox monitoring**: depth thresholds with metrics
//!   (Room/Controller: 100/500, Connection: 50/200)
//!
//! # Modules
//!
//! - [`controller`] - `RoomControllerActor`, the room store and supervisor
//! - [`room`] - `RoomActor` per live room
//! - [`connection`] - `ConnectionActor` per WebSocket connection
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod connection;
pub mod controller;
pub mod messages;
pub mod metrics;
pub mod room;

pub use connection::{
    ConnectionActor, ConnectionActorHandle, DeliveryError, OutboundFrame,
    CONNECTION_CHANNEL_BUFFER,
};
pub use controller::{RoomControllerActor, RoomControllerActorHandle};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxLevel, MailboxLimits, MailboxMonitor};
pub use room::{RoomActor, RoomActorHandle, RoomSettings};
