//! Chat session and message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation with the assistant.
///
/// Identified by a client-generated id (`chat_<epoch-ms>_<random>`); the
/// title, snippet and counters mutate on every message exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: i64,
    pub is_pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            last_message: None,
            last_message_at: None,
            message_count: 0,
            is_pinned: false,
            pinned_at: None,
            created_at,
        }
    }

    /// Record a new message exchange on the session.
    pub fn touch(&mut self, snippet: impl Into<String>, at: DateTime<Utc>) {
        self.last_message = Some(snippet.into());
        self.last_message_at = Some(at);
        self.message_count += 1;
    }
}

/// Author of a message turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Message content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Audio,
}

/// One turn inside a chat session. Immutable after creation except for
/// content grown in place while the assistant reply streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub content: String,
    pub role: MessageRole,
    pub message_type: MessageType,
    pub audio_uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn text(
        id: impl Into<String>,
        chat_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            role,
            message_type: MessageType::Text,
            audio_uri: None,
            created_at,
        }
    }
}
