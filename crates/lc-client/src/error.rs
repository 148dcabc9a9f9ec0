use lc_protocol::ProtocolError;
use thiserror::Error;

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The WebSocket handshake failed.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// An outbound event could not be encoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The session is closed; nothing more can be sent.
    #[error("Disconnected")]
    Disconnected,
}
