//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding frames.
///
/// Decode errors are raised at the boundary, before an event reaches any
/// room. They carry enough context to build a rejection acknowledgment.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not a JSON envelope with an `event` name.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The envelope names an event this protocol does not define.
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// The event payload is missing fields or has invalid values.
    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload { event: String, reason: String },

    /// Serializing an outbound event failed.
    #[error("Encode error: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// The event name the error relates to, when known.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        match self {
            ProtocolError::UnknownEvent(event) | ProtocolError::InvalidPayload { event, .. } => {
                Some(event)
            }
            ProtocolError::MalformedFrame(_) | ProtocolError::Encode(_) => None,
        }
    }

    /// Bounded label for rejection metrics.
    #[must_use]
    pub const fn reason_label(&self) -> &'static str {
        match self {
            ProtocolError::MalformedFrame(_) => "malformed_frame",
            ProtocolError::UnknownEvent(_) => "unknown_event",
            ProtocolError::InvalidPayload { .. } => "invalid_payload",
            ProtocolError::Encode(_) => "encode",
        }
    }

    pub(crate) fn invalid(event: &str, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidPayload {
            event: event.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_is_exposed() {
        let err = ProtocolError::invalid("raise-hand", "missing field `raised`");
        assert_eq!(err.event(), Some("raise-hand"));
        assert_eq!(err.reason_label(), "invalid_payload");

        let err = ProtocolError::MalformedFrame("eof".to_string());
        assert_eq!(err.event(), None);
        assert_eq!(err.reason_label(), "malformed_frame");
    }

    #[test]
    fn test_display() {
        let err = ProtocolError::UnknownEvent("dance".to_string());
        assert_eq!(err.to_string(), "Unknown event: dance");
    }
}
