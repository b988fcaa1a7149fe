//! Client-side natural-key generation.
//!
//! Natural keys are minted on the device so records created offline can be
//! matched remotely later without a server round trip.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// UUID v4 for check-ins and journal entries.
pub fn new_entry_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// `chat_<epoch-ms>_<random>` id for chat sessions and messages.
pub fn new_chat_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("chat_{}_{}", now.timestamp_millis(), suffix)
}
