//! Journal entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A free-form journal entry, keyed by a client-generated UUID.
///
/// Entries without a `journal_id` predate UUID assignment; reconciliation
/// assigns one before the first remote create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub journal_id: Option<String>,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(
        journal_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            journal_id: Some(journal_id.into()),
            title: title.into(),
            content: content.into(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn edit(&mut self, title: impl Into<String>, content: impl Into<String>, at: DateTime<Utc>) {
        self.title = title.into();
        self.content = content.into();
        self.updated_at = at;
    }
}
