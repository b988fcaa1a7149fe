//! Error types for the sync core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for sync core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classification of a remote-service failure, driving retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// Session invalid or expired. Forces a full local sign-out.
    Auth,
    /// Duplicate natural key on create. Treated as success-by-equivalence.
    Conflict,
    /// No connectivity or timeout. Retried via the queue.
    TransientNetwork,
    /// Anything else. Retried up to the bound, then dead-lettered.
    Unknown,
}

/// A failure reported by the remote service client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote error ({kind:?}): {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Auth, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Conflict, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::TransientNetwork, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Unknown, message)
    }

    /// Duplicate-natural-key failure on create.
    pub fn is_conflict(&self) -> bool {
        self.kind == RemoteErrorKind::Conflict
    }

    /// Session invalid or expired.
    pub fn is_auth(&self) -> bool {
        self.kind == RemoteErrorKind::Auth
    }
}

/// Errors raised by the local record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage layer failure (sqlite, filesystem, lock).
    #[error("storage error: {0}")]
    Backend(String),

    /// A persisted record could not be decoded.
    #[error("corrupt record under '{key}': {message}")]
    Corrupt { key: String, message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Top-level error for sync core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No authenticated session; sync cannot run.
    #[error("no authenticated session")]
    NoSession,

    /// A direct sync call raced a run already holding the guard.
    #[error("a sync run is already in progress")]
    SyncInProgress,

    /// The authenticated user changed while a sync run was in flight.
    #[error("session changed during sync (was user '{user_id}')")]
    SessionChanged { user_id: String },

    /// A mood value outside the 1..=5 ordinal range.
    #[error("mood out of range: {0} (expected 1..=5)")]
    MoodOutOfRange(u8),
}

impl Error {
    /// The remote failure inside this error, if any.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }

    /// True when the sync path must tear the session down.
    pub fn requires_sign_out(&self) -> bool {
        matches!(self, Self::Remote(err) if err.is_auth())
    }
}
