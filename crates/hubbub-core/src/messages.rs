//! Chat wire message types.
//!
//! Every frame on the wire is one JSON-encoded [`ChatMessage`]. The `type`
//! field is a closed set; anything else fails decoding instead of falling
//! through as a zero-valued message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message kind tags; must match the wire strings used by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Credential check; `text` carries the password.
    Login,
    /// Account creation; `text` carries the password.
    Register,
    /// Chat to everyone else in the room.
    RoomChat,
    /// Direct message; `receiver` names the target.
    Dm,
    /// Client is leaving; connection is torn down afterwards.
    Exit,
    /// Server-originated notice. Never accepted from a client.
    Broadcast,
}

impl MessageKind {
    /// The exact string this kind serializes to.
    pub fn as_wire(&self) -> &'static str {
        match self {
            MessageKind::Login => "LOGIN",
            MessageKind::Register => "REGISTER",
            MessageKind::RoomChat => "ROOM_CHAT",
            MessageKind::Dm => "DM",
            MessageKind::Exit => "EXIT",
            MessageKind::Broadcast => "BROADCAST",
        }
    }
}

/// A single chat message as it travels over the wire and into the transcript.
///
/// `timestamp` is stamped by the server dispatcher; client-originated
/// messages leave it unset. `receiver` is only populated for DMs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// LOGIN request carrying the plaintext password in `text`.
    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            receiver: None,
            text: password.into(),
            kind: MessageKind::Login,
            timestamp: None,
        }
    }

    /// REGISTER request carrying the plaintext password in `text`.
    pub fn register(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            receiver: None,
            text: password.into(),
            kind: MessageKind::Register,
            timestamp: None,
        }
    }

    /// Room-wide chat message.
    pub fn room_chat(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            receiver: None,
            text: text.into(),
            kind: MessageKind::RoomChat,
            timestamp: None,
        }
    }

    /// Direct message to `receiver`.
    pub fn dm(
        username: impl Into<String>,
        receiver: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            receiver: Some(receiver.into()),
            text: text.into(),
            kind: MessageKind::Dm,
            timestamp: None,
        }
    }

    /// EXIT notification; the server unregisters the connection on receipt.
    pub fn exit(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            receiver: None,
            text: String::new(),
            kind: MessageKind::Exit,
            timestamp: None,
        }
    }

    /// Server reply to the sender, mirroring the request kind (LOGIN/REGISTER
    /// acknowledgments and errors).
    pub fn reply(kind: MessageKind, username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            receiver: None,
            text: text.into(),
            kind,
            timestamp: None,
        }
    }

    /// Server-originated room notice.
    pub fn broadcast(text: impl Into<String>) -> Self {
        Self {
            username: String::new(),
            receiver: None,
            text: text.into(),
            kind: MessageKind::Broadcast,
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_strings() {
        for (kind, wire) in [
            (MessageKind::Login, "LOGIN"),
            (MessageKind::Register, "REGISTER"),
            (MessageKind::RoomChat, "ROOM_CHAT"),
            (MessageKind::Dm, "DM"),
            (MessageKind::Exit, "EXIT"),
            (MessageKind::Broadcast, "BROADCAST"),
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{wire}\""));
            assert_eq!(kind.as_wire(), wire);
        }
    }

    #[test]
    fn dm_populates_receiver() {
        let msg = ChatMessage::dm("alice", "bob", "hi");
        assert_eq!(msg.receiver.as_deref(), Some("bob"));
        assert_eq!(msg.kind, MessageKind::Dm);
    }

    #[test]
    fn room_chat_has_no_receiver() {
        let msg = ChatMessage::room_chat("alice", "hello room");
        assert!(msg.receiver.is_none());
        assert!(msg.timestamp.is_none());
    }
}
