//! Core types shared by the client and the session layer

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Backend identifier of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ConversationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(ConversationId)
    }
}

/// Backend identifier of a persisted message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned id; `None` for messages appended locally and never
    /// reconciled with the backend
    #[serde(default)]
    pub id: Option<MessageId>,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Inline transport-failure notice rather than answer text
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    /// Create a local user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            is_error: false,
        }
    }

    /// Create a local assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
            is_error: false,
        }
    }

    /// Create an assistant-role failure notice
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(content)
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Whether this message only exists locally
    pub fn is_local(&self) -> bool {
        self.id.is_none()
    }
}

/// Body of `POST /chat/stream`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub question: String,
    pub conversation_id: ConversationId,
}

impl ChatRequest {
    pub fn new(conversation_id: ConversationId, question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            conversation_id,
        }
    }
}

/// Body of `GET /conversations/{id}/vector-status`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexStatus {
    pub status: String,
    #[serde(default)]
    pub doc_count: Option<u32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl IndexStatus {
    /// Label reported once the index can be queried
    pub const READY: &'static str = "ready";
    /// Label reported when indexing failed for good
    pub const ERROR: &'static str = "error";

    pub fn is_ready(&self) -> bool {
        self.status == Self::READY
    }

    pub fn is_error(&self) -> bool {
        self.status == Self::ERROR
    }

    pub fn is_terminal(&self) -> bool {
        self.is_ready() || self.is_error()
    }
}

/// One element of `GET /conversations/{id}/messages`
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<HistoryMessage> for Message {
    fn from(m: HistoryMessage) -> Self {
        Message {
            id: Some(m.id),
            role: m.role,
            content: m.content,
            created_at: m.created_at,
            is_error: false,
        }
    }
}

/// Error body returned by the backend on non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Flatten `detail` into display text (validation errors arrive as a list)
    pub fn detail_text(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Accept RFC 3339 timestamps as well as the offset-less form the backend
/// emits for naive datetimes (interpreted as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_wire_shape() {
        let req = ChatRequest::new(ConversationId(7), "What is RAG?");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "question": "What is RAG?", "conversation_id": 7 })
        );
    }

    #[test]
    fn test_index_status_labels() {
        let s: IndexStatus = serde_json::from_str(r#"{"status":"building","doc_count":2}"#).unwrap();
        assert!(!s.is_terminal());
        assert_eq!(s.doc_count, Some(2));

        let s: IndexStatus = serde_json::from_str(r#"{"status":"ready","doc_count":3}"#).unwrap();
        assert!(s.is_ready() && s.is_terminal());

        let s: IndexStatus =
            serde_json::from_str(r#"{"status":"error","error_message":"no text"}"#).unwrap();
        assert!(s.is_error());
        assert_eq!(s.error_message.as_deref(), Some("no text"));
    }

    #[test]
    fn test_history_naive_timestamp() {
        let json = r#"{
            "id": 12,
            "conversation_id": 3,
            "role": "assistant",
            "content": "Hi",
            "created_at": "2024-05-01T10:20:30.123456"
        }"#;
        let h: HistoryMessage = serde_json::from_str(json).unwrap();
        let msg: Message = h.into();
        assert_eq!(msg.id, Some(MessageId(12)));
        assert!(msg.is_assistant());
        assert!(!msg.is_local());
        assert_eq!(msg.created_at.to_rfc3339(), "2024-05-01T10:20:30.123456+00:00");
    }

    #[test]
    fn test_history_offset_timestamp() {
        let json = r#"{
            "id": 1,
            "conversation_id": 3,
            "role": "user",
            "content": "Q",
            "created_at": "2024-05-01T12:00:00+02:00"
        }"#;
        let h: HistoryMessage = serde_json::from_str(json).unwrap();
        assert_eq!(h.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_error_body_detail_text() {
        let b: ErrorBody = serde_json::from_str(r#"{"detail":"Not authenticated"}"#).unwrap();
        assert_eq!(b.detail_text(), "Not authenticated");

        let b: ErrorBody = serde_json::from_str(r#"{"detail":[{"msg":"field required"}]}"#).unwrap();
        assert_eq!(b.detail_text(), r#"[{"msg":"field required"}]"#);
    }

    #[test]
    fn test_local_messages() {
        let m = Message::error("Lost connection to the server.");
        assert!(m.is_assistant() && m.is_error && m.is_local());
        assert!(Message::user("q").is_user());
    }

    #[test]
    fn test_conversation_id_parse() {
        assert_eq!(" 42 ".parse::<ConversationId>().unwrap(), ConversationId(42));
        assert!("abc".parse::<ConversationId>().is_err());
    }
}
