use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::session::ChatRole;

/// Messages accepted from WebSocket clients.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register a participant in the session roster.
    Join { student_id: String, name: String },
    /// Post a chat message; blank messages are dropped silently.
    Chat {
        sender: String,
        role: ChatRole,
        message: String,
    },
    /// Teacher moderation: remove the targeted connection.
    Kick { connection_id: Uuid },
    /// Submit a vote for the active poll.
    Vote {
        poll_id: Uuid,
        student_id: String,
        option_id: Uuid,
    },
}

impl ClientMessage {
    /// Parse a raw text frame into a client message.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_join_message() {
        let message =
            ClientMessage::from_json_str(r#"{"type":"join","student_id":"s1","name":"Ada"}"#)
                .unwrap();
        match message {
            ClientMessage::Join { student_id, name } => {
                assert_eq!(student_id, "s1");
                assert_eq!(name, "Ada");
            }
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn parses_chat_role() {
        let message = ClientMessage::from_json_str(
            r#"{"type":"chat","sender":"Ms. K","role":"teacher","message":"hello"}"#,
        )
        .unwrap();
        match message {
            ClientMessage::Chat { role, .. } => assert_eq!(role, ChatRole::Teacher),
            other => panic!("expected chat, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(ClientMessage::from_json_str(r#"{"type":"shout","text":"hi"}"#).is_err());
    }
}
