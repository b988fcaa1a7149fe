//! Wire rows for the backend's table API.
//!
//! Tables use snake_case columns and store the entity's client-generated
//! natural key alongside `user_id`; the local camelCase models never cross
//! the wire directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mindwell_core::models::{
    ChatSession, CheckinEntry, JournalEntry, Message, MessageRole, MessageType, Mood,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatSessionRow {
    pub user_id: String,
    pub session_id: String,
    pub title: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: i64,
    pub is_pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ChatSessionRow {
    pub fn from_model(user_id: &str, session: &ChatSession) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id: session.id.clone(),
            title: session.title.clone(),
            last_message: session.last_message.clone(),
            last_message_at: session.last_message_at,
            message_count: session.message_count,
            is_pinned: session.is_pinned,
            pinned_at: session.pinned_at,
            created_at: session.created_at,
        }
    }

    pub fn into_model(self) -> ChatSession {
        ChatSession {
            id: self.session_id,
            title: self.title,
            last_message: self.last_message,
            last_message_at: self.last_message_at,
            message_count: self.message_count,
            is_pinned: self.is_pinned,
            pinned_at: self.pinned_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MessageRow {
    pub user_id: String,
    pub message_id: String,
    pub session_id: String,
    pub content: String,
    pub role: MessageRole,
    pub message_type: MessageType,
    pub audio_uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    pub fn from_model(user_id: &str, message: &Message) -> Self {
        Self {
            user_id: user_id.to_string(),
            message_id: message.id.clone(),
            session_id: message.chat_id.clone(),
            content: message.content.clone(),
            role: message.role,
            message_type: message.message_type,
            audio_uri: message.audio_uri.clone(),
            created_at: message.created_at,
        }
    }

    pub fn into_model(self) -> Message {
        Message {
            id: self.message_id,
            chat_id: self.session_id,
            content: self.content,
            role: self.role,
            message_type: self.message_type,
            audio_uri: self.audio_uri,
            created_at: self.created_at,
        }
    }
}

/// `(user_id, date)` is unique server-side; `checkin_id` may be null on rows
/// written before the UUID column existed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CheckinRow {
    pub user_id: String,
    pub checkin_id: Option<String>,
    pub mood: Mood,
    #[serde(default)]
    pub notes: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckinRow {
    pub fn from_model(user_id: &str, entry: &CheckinEntry) -> Self {
        Self {
            user_id: user_id.to_string(),
            checkin_id: entry.checkin_id.clone(),
            mood: entry.mood,
            notes: entry.notes.clone(),
            date: entry.date,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }

    pub fn into_model(self) -> CheckinEntry {
        CheckinEntry {
            checkin_id: self.checkin_id,
            mood: self.mood,
            notes: self.notes,
            date: self.date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct JournalRow {
    pub user_id: String,
    pub journal_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalRow {
    pub fn from_model(user_id: &str, journal_id: &str, entry: &JournalEntry) -> Self {
        Self {
            user_id: user_id.to_string(),
            journal_id: journal_id.to_string(),
            title: entry.title.clone(),
            content: entry.content.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }

    pub fn into_model(self) -> JournalEntry {
        JournalEntry {
            journal_id: Some(self.journal_id),
            title: self.title,
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
