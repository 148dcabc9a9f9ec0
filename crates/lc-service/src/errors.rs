//! Live Class Controller error types.
//!
//! Error types map to rejection codes sent in `event-rejected` frames.
//! Internal details are logged server-side but not exposed to clients.

use lc_protocol::ProtocolError;
use thiserror::Error;

/// Live Class Controller error type.
///
/// Maps to rejection codes:
/// - `Protocol`: `INVALID_REQUEST` (1)
/// - `Internal`, `RoomClosed`: `INTERNAL_ERROR` (6)
/// - `RoomCapacityExceeded`, `ServiceCapacityExceeded`, `Draining`: `CAPACITY_EXCEEDED` (7)
#[derive(Debug, Error)]
pub enum LcError {
    /// The frame could not be decoded into a client event.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The room actor has stopped (reclaimed or shut down).
    #[error("Room closed")]
    RoomClosed,

    /// The room has reached its participant limit.
    #[error("Room at capacity: {0}")]
    RoomCapacityExceeded(String),

    /// The controller has reached its room limit (load shedding).
    #[error("Controller at capacity")]
    ServiceCapacityExceeded,

    /// The controller is draining (graceful shutdown).
    #[error("Controller is draining")]
    Draining,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LcError {
    /// Returns the rejection code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            LcError::Protocol(_) => 1,                       // INVALID_REQUEST
            LcError::RoomClosed | LcError::Internal(_) => 6, // INTERNAL_ERROR
            LcError::RoomCapacityExceeded(_)
            | LcError::ServiceCapacityExceeded
            | LcError::Draining => 7, // CAPACITY_EXCEEDED
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            LcError::Protocol(ProtocolError::MalformedFrame(_)) => {
                "Frame is not a valid event envelope".to_string()
            }
            LcError::Protocol(ProtocolError::UnknownEvent(event)) => {
                format!("Unknown event: {event}")
            }
            LcError::Protocol(ProtocolError::InvalidPayload { reason, .. }) => {
                format!("Invalid payload: {reason}")
            }
            LcError::Protocol(ProtocolError::Encode(_))
            | LcError::RoomClosed
            | LcError::Internal(_) => "An internal error occurred".to_string(),
            LcError::RoomCapacityExceeded(_) => "Room is at capacity".to_string(),
            LcError::ServiceCapacityExceeded => {
                "Server is at capacity, please try again".to_string()
            }
            LcError::Draining => "Server is shutting down, please reconnect".to_string(),
        }
    }

    /// Bounded label for rejection metrics.
    #[must_use]
    pub const fn reason_label(&self) -> &'static str {
        match self {
            LcError::Protocol(e) => e.reason_label(),
            LcError::RoomClosed => "room_closed",
            LcError::RoomCapacityExceeded(_) => "room_full",
            LcError::ServiceCapacityExceeded => "service_full",
            LcError::Draining => "draining",
            LcError::Internal(_) => "internal",
        }
    }

    /// Whether the client should be told about this error.
    ///
    /// Internal failures are logged and the triggering event is dropped.
    #[must_use]
    pub const fn is_client_visible(&self) -> bool {
        !matches!(
            self,
            LcError::RoomClosed
                | LcError::Internal(_)
                | LcError::Protocol(ProtocolError::Encode(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LcError::Protocol(ProtocolError::MalformedFrame("x".to_string())).error_code(),
            1
        );
        assert_eq!(LcError::RoomClosed.error_code(), 6);
        assert_eq!(LcError::Internal("boom".to_string()).error_code(), 6);
        assert_eq!(
            LcError::RoomCapacityExceeded("class-42".to_string()).error_code(),
            7
        );
        assert_eq!(LcError::ServiceCapacityExceeded.error_code(), 7);
        assert_eq!(LcError::Draining.error_code(), 7);
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = LcError::Internal("room actor mailbox closed at 0xdeadbeef".to_string());
        assert_eq!(err.client_message(), "An internal error occurred");

        let err = LcError::RoomCapacityExceeded("class-secret".to_string());
        assert!(!err.client_message().contains("class-secret"));
    }

    #[test]
    fn test_protocol_messages_name_the_problem() {
        let err = LcError::from(ProtocolError::UnknownEvent("dance".to_string()));
        assert_eq!(err.client_message(), "Unknown event: dance");

        let err = LcError::from(ProtocolError::InvalidPayload {
            event: "raise-hand".to_string(),
            reason: "missing field `raised`".to_string(),
        });
        assert_eq!(
            err.client_message(),
            "Invalid payload: missing field `raised`"
        );
    }

    #[test]
    fn test_visibility() {
        assert!(LcError::Draining.is_client_visible());
        assert!(LcError::RoomCapacityExceeded(String::new()).is_client_visible());
        assert!(!LcError::RoomClosed.is_client_visible());
        assert!(!LcError::Internal(String::new()).is_client_visible());
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(LcError::Draining.reason_label(), "draining");
        assert_eq!(
            LcError::from(ProtocolError::MalformedFrame(String::new())).reason_label(),
            "malformed_frame"
        );
    }
}
