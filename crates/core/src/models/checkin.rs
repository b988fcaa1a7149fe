//! Daily mood check-in model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Bounded mood ordinal, 1 (low) through 5 (high).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Mood(u8);

impl Mood {
    pub fn new(value: u8) -> Result<Self, Error> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::MoodOutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Mood {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        Self::new(value)
    }
}

impl From<Mood> for u8 {
    fn from(mood: Mood) -> u8 {
        mood.0
    }
}

/// One mood check-in per user per calendar day.
///
/// `(user, date)` is the domain natural key; `checkin_id` is a client-side
/// UUID used for cross-store matching. Records written before the UUID was
/// introduced carry `None` and are healed during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinEntry {
    pub checkin_id: Option<String>,
    pub mood: Mood,
    #[serde(default)]
    pub notes: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckinEntry {
    pub fn new(
        checkin_id: impl Into<String>,
        mood: Mood,
        notes: impl Into<String>,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            checkin_id: Some(checkin_id.into()),
            mood,
            notes: notes.into(),
            date,
            created_at: at,
            updated_at: at,
        }
    }

    /// Same-day saves are updates, never second inserts.
    pub fn edit(&mut self, mood: Mood, notes: impl Into<String>, at: DateTime<Utc>) {
        self.mood = mood;
        self.notes = notes.into();
        self.updated_at = at;
    }
}
