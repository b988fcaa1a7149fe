//! Sync domain models, triggers and constants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Background cadence while a session is active.
pub const SYNC_INTERVAL_SECS: u64 = 30;

/// Maximum jitter (seconds) added to periodic runs so a fleet of devices
/// does not hit the backend in lockstep.
pub const SYNC_INTERVAL_JITTER_SECS: u64 = 5;

/// Attempts per queued write before it is dead-lettered.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Client-side timeout applied to every remote call.
pub const REMOTE_CALL_TIMEOUT_SECS: u64 = 30;

/// Entity kinds participating in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntity {
    ChatSession,
    Message,
    Checkin,
    JournalEntry,
}

/// Supported remote-write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

/// A deferred remote write, persisted until the backend confirms it.
///
/// `id` doubles as the dedup key: re-enqueueing the same id replaces the
/// stored item rather than appending a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedWrite {
    pub id: String,
    pub entity: SyncEntity,
    pub op: SyncOperation,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl QueuedWrite {
    pub fn new(
        id: impl Into<String>,
        entity: SyncEntity,
        op: SyncOperation,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            entity,
            op,
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
        }
    }
}

/// An authenticated backend session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
}

/// What fired a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Connectivity,
    Foreground,
    Interval,
    Manual,
    Login,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The sync body ran to completion.
    Completed,
    /// Device offline; nothing attempted.
    Offline,
    /// No authenticated session; nothing attempted.
    NoSession,
    /// Sync switched off in the user's preferences; nothing attempted.
    Disabled,
    /// Another run held the guard; this trigger was dropped, not queued.
    AlreadyRunning,
    /// The authenticated user changed mid-run; remaining work abandoned.
    SessionChanged,
    /// The backend rejected the credentials; the session was torn down.
    AuthRequired,
}

/// Counters reported by one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunReport {
    pub trigger: SyncTrigger,
    pub outcome: SyncOutcome,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub delivered: usize,
    pub pulled: usize,
    pub duration_ms: i64,
}

impl SyncRunReport {
    pub fn skipped(trigger: SyncTrigger, outcome: SyncOutcome) -> Self {
        Self {
            trigger,
            outcome,
            created: 0,
            updated: 0,
            failed: 0,
            delivered: 0,
            pulled: 0,
            duration_ms: 0,
        }
    }
}

/// Sync state surfaced to calling UI code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Writes still waiting in the retry queue.
    pub pending_count: usize,
    /// Writes dropped after exhausting their retry budget.
    pub dead_letter_count: u64,
    pub in_progress: bool,
}
