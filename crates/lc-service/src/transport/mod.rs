//! Client transports.
//!
//! - [`websocket`] - WebSocket endpoint: one reader task and one
//!   `ConnectionActor` writer per client

pub mod websocket;

pub use websocket::ws_handler;
