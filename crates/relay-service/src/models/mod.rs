//! Wire and persisted message model.

use serde::{Deserialize, Serialize};

/// A chat message as exchanged with clients and stored in history.
///
/// Clients send the same shape they receive, but only `content` is honoured:
/// `user_id`, `room` and `time` are always overwritten by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub content: String,
    /// Unix seconds, assigned at receipt.
    #[serde(default)]
    pub time: i64,
}

impl ChatMessage {
    /// Decode a client frame and stamp it with server-assigned fields.
    ///
    /// # Errors
    ///
    /// Returns the decode error if the frame is not a JSON object of the
    /// message shape. Callers drop such frames.
    pub fn from_client(
        frame: &[u8],
        user_id: &str,
        room: &str,
        now: i64,
    ) -> Result<Self, serde_json::Error> {
        let mut message: ChatMessage = serde_json::from_slice(frame)?;
        message.user_id = user_id.to_string();
        message.room = room.to_string();
        message.time = now;
        Ok(message)
    }

    /// Serialize to the JSON text stored in history and sent to members.
    ///
    /// # Errors
    ///
    /// Returns the serialization error (not expected for this plain struct).
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_client_overwrites_server_fields() {
        let frame = br#"{"user_id":"mallory","room":"admin","content":"hello","time":1}"#;

        let message = ChatMessage::from_client(frame, "alice", "r1", 1_700_000_000).unwrap();

        assert_eq!(message.user_id, "alice");
        assert_eq!(message.room, "r1");
        assert_eq!(message.content, "hello");
        assert_eq!(message.time, 1_700_000_000);
    }

    #[test]
    fn test_from_client_content_only() {
        let message = ChatMessage::from_client(br#"{"content":"hi"}"#, "bob", "lobby", 42).unwrap();

        assert_eq!(message.content, "hi");
        assert_eq!(message.user_id, "bob");
    }

    #[test]
    fn test_from_client_empty_object_has_empty_content() {
        let message = ChatMessage::from_client(b"{}", "bob", "lobby", 42).unwrap();
        assert_eq!(message.content, "");
    }

    #[test]
    fn test_from_client_rejects_malformed_frames() {
        assert!(ChatMessage::from_client(b"not json", "bob", "lobby", 0).is_err());
        assert!(ChatMessage::from_client(br#""just a string""#, "bob", "lobby", 0).is_err());
        assert!(ChatMessage::from_client(br#"{"content":5}"#, "bob", "lobby", 0).is_err());
        assert!(ChatMessage::from_client(br#"{"time":"noon"}"#, "bob", "lobby", 0).is_err());
    }

    #[test]
    fn test_payload_field_names() {
        let message = ChatMessage {
            user_id: "alice".to_string(),
            room: "r1".to_string(),
            content: "hi".to_string(),
            time: 7,
        };

        let value: serde_json::Value = serde_json::from_str(&message.to_payload().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"user_id": "alice", "room": "r1", "content": "hi", "time": 7})
        );
    }
}
