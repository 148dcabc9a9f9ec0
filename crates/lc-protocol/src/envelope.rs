//! Frame envelope encoding and decoding.
//!
//! `{"event": <name>, "data": <payload>}` is the only frame shape. The
//! envelope is split first and `data` is kept as raw JSON until the event
//! name has selected the payload record.

use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Envelope as received, with the payload still undecoded.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

/// Envelope as sent.
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    event: &'a str,
    data: &'a T,
}

/// An envelope whose payload has not been decoded yet.
#[derive(Debug)]
pub struct Frame {
    /// Event name.
    pub event: String,
    data: Option<Box<RawValue>>,
}

impl Frame {
    /// Split a text frame into its event name and raw payload.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::MalformedFrame` if the text is not a JSON
    /// object with a string `event` field.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;

        Ok(Self {
            event: raw.event,
            data: raw.data,
        })
    }

    /// Decode the payload into the record for this event.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidPayload` if `data` is absent or does
    /// not match the record.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| ProtocolError::invalid(&self.event, "missing data"))?;

        serde_json::from_str(data.get()).map_err(|e| ProtocolError::invalid(&self.event, e.to_string()))
    }
}

/// Encode an event name and payload into a text frame.
///
/// # Errors
///
/// Returns `ProtocolError::Encode` if the payload fails to serialize.
pub fn encode<T: Serialize>(event: &str, data: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(&Envelope { event, data })
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Ping {
        n: u32,
    }

    #[test]
    fn test_parse_keeps_event_name() {
        let frame = Frame::parse(r#"{"event":"ping","data":{"n":3}}"#).unwrap();
        assert_eq!(frame.event, "ping");
        assert_eq!(frame.decode_data::<Ping>().unwrap(), Ping { n: 3 });
    }

    #[test]
    fn test_parse_rejects_non_envelope() {
        assert!(matches!(
            Frame::parse("not json"),
            Err(ProtocolError::MalformedFrame(_))
        ));
        assert!(matches!(
            Frame::parse(r#"{"data":{}}"#),
            Err(ProtocolError::MalformedFrame(_))
        ));
        assert!(matches!(
            Frame::parse(r#"["join-room", {}]"#),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_missing_data_is_invalid_payload() {
        let frame = Frame::parse(r#"{"event":"ping"}"#).unwrap();
        let err = frame.decode_data::<Ping>().unwrap_err();
        assert_eq!(err.event(), Some("ping"));
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));

        let frame = Frame::parse(r#"{"event":"ping","data":null}"#).unwrap();
        assert!(frame.decode_data::<Ping>().is_err());
    }

    #[test]
    fn test_encode_wraps_payload() {
        let text = encode("ping", &Ping { n: 7 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"event": "ping", "data": {"n": 7}}));
    }
}
