//! Live Class Controller (LC) Service Library
//!
//! This library provides the real-time coordination core for live classes:
//!
//! - Many WebSocket clients joining named rooms (one per scheduled class)
//! - An authoritative, ordered participant roster per room
//! - Chat and hand-raise fan-out with a per-room message sequence
//! - Broadcast/request signaling and opaque peer payload relay; media never
//!   passes through the controller
//! - Empty-room reclamation after a grace period
//!
//! # Architecture
//!
//! ```text
//! RoomControllerActor (singleton)
//! └── supervises N RoomActors
//!     └── RoomActor (one per live room, owns all room state)
//!
//! per WebSocket: reader task -> EventHub -> RoomActor -> ConnectionActor -> writer
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Actor model implementation
//! - [`registry`] - Connection registry
//! - [`hub`] - Client event routing and rejections
//! - [`transport`] - WebSocket endpoint
//! - [`routes`] - Axum router and shared state
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with rejection codes
//! - [`observability`] - Metrics and health endpoints

pub mod actors;
pub mod config;
pub mod errors;
pub mod hub;
pub mod observability;
pub mod registry;
pub mod routes;
pub mod transport;
