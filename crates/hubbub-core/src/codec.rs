//! JSON codec for the WebSocket text channel.
//!
//! Wire format: one JSON object per text frame.

use crate::error::{RelayError, RelayResult};
use crate::messages::ChatMessage;

/// Encode a message into its JSON wire form.
pub fn encode(msg: &ChatMessage) -> RelayResult<String> {
    serde_json::to_string(msg).map_err(|e| RelayError::Codec(e.to_string()))
}

/// Decode a JSON wire payload into a typed message.
///
/// An unknown `type` tag or malformed JSON is an explicit error; the caller
/// never sees a zero-valued message.
pub fn decode(raw: &str) -> RelayResult<ChatMessage> {
    serde_json::from_str(raw).map_err(|e| RelayError::InvalidMessage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageKind;
    use chrono::{TimeZone, Utc};

    #[test]
    fn round_trip_dm() {
        let msg = ChatMessage::dm("alice", "bob", "lunch?");
        let raw = encode(&msg).unwrap();
        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let raw = r#"{"username":"alice","text":"hi","type":"SHOUT"}"#;
        let err = decode(raw).unwrap_err();
        assert!(matches!(err, RelayError::InvalidMessage(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(decode("{not json").is_err());
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let mut msg = ChatMessage::room_chat("alice", "hi");
        msg.timestamp = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap());
        let raw = encode(&msg).unwrap();
        assert!(raw.contains("\"timestamp\":\"2024-05-01T12:30:00Z\""));
    }

    #[test]
    fn missing_optional_fields_default() {
        let raw = r#"{"username":"alice","text":"pw","type":"LOGIN"}"#;
        let msg = decode(raw).unwrap();
        assert_eq!(msg.kind, MessageKind::Login);
        assert!(msg.receiver.is_none());
        assert!(msg.timestamp.is_none());
    }
}
