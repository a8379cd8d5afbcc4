//! Message model representing one bubble in a chat conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SessionId;

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Reply (or surfaced failure) from the assistant.
    Assistant,
}

impl MessageRole {
    /// Convert role to its wire string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse role from its wire string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message in a chat conversation.
///
/// The serialized form matches the chat backend's history records:
/// `{"_id", "sessionId", "message", "role", "timestamp", "isError"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Backend-assigned identifier, absent for messages created locally.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Conversation this message belongs to (session-backed chats only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Content of the message.
    #[serde(rename = "message")]
    pub text: String,
    /// Author of the message.
    pub role: MessageRole,
    /// Client-assigned creation time.
    pub timestamp: DateTime<Utc>,
    /// Set on assistant messages that report a failure instead of a model reply.
    #[serde(default, alias = "error", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    fn new(role: MessageRole, text: String, is_error: bool) -> Self {
        Self {
            id: None,
            session_id: None,
            text,
            role,
            timestamp: Utc::now(),
            is_error,
        }
    }

    /// Create a user message stamped with the current time.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text.into(), false)
    }

    /// Create a successful assistant reply.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text.into(), false)
    }

    /// Create an assistant message describing a failure.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text.into(), true)
    }

    /// Attach the conversation this message belongs to.
    #[must_use]
    pub fn with_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Attach a backend identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_assistant_authored() {
        let msg = Message::error("boom");
        assert_eq!(msg.role, MessageRole::Assistant);
        assert!(msg.is_error);
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [MessageRole::User, MessageRole::Assistant] {
            assert_eq!(MessageRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::from_str("system"), None);
    }

    #[test]
    fn test_deserialize_backend_history_record() {
        let json = r#"{
            "_id": "65f0c1",
            "sessionId": "session_1700000000000_abc123xyz",
            "message": "What is ROP?",
            "role": "user",
            "timestamp": "2024-03-12T10:15:00.000Z"
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id.as_deref(), Some("65f0c1"));
        assert_eq!(
            msg.session_id.as_ref().map(SessionId::as_str),
            Some("session_1700000000000_abc123xyz")
        );
        assert_eq!(msg.text, "What is ROP?");
        assert_eq!(msg.role, MessageRole::User);
        assert!(!msg.is_error);
    }

    #[test]
    fn test_legacy_error_flag_is_accepted() {
        let json = r#"{"message":"oops","role":"assistant","timestamp":"2024-03-12T10:15:00Z","error":true}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.is_error);
    }

    #[test]
    fn test_serialize_omits_unset_fields() {
        let value = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(value["message"], "hi");
        assert_eq!(value["role"], "assistant");
        assert!(value.get("_id").is_none());
        assert!(value.get("sessionId").is_none());
        assert!(value.get("isError").is_none());
    }
}
