//! Live Class client.
//!
//! An owned WebSocket session with the live-class controller. A process
//! constructs as many clients as it needs; there is no shared global
//! connection.
//!
//! ```rust,ignore
//! use lc_client::LiveClassClient;
//! use lc_protocol::{Role, UserProfile};
//!
//! let (client, mut events) = LiveClassClient::connect("ws://127.0.0.1:8090/ws").await?;
//! client
//!     .join_room("class-42", UserProfile::new("u-1", "Ada", Role::Instructor))
//!     .await?;
//!
//! while let Some(roster) = events.roster.recv().await {
//!     println!("{} in class", roster.participants.len());
//! }
//!
//! client.disconnect().await;
//! ```
//!
//! Server events arrive on one channel per category (see [`ClientEvents`]).
//! Emitters are fire-and-forget: they return once the frame is queued for
//! the socket.

mod client;
mod error;
mod events;

pub use client::LiveClassClient;
pub use error::ClientError;
pub use events::{ClientEvents, EVENT_CHANNEL_CAPACITY};
