//! Backend error types and their mapping onto the sync error taxonomy.

use mindwell_core::{RemoteError, RemoteErrorKind};
use thiserror::Error;

/// Postgres duplicate-key SQLSTATE, surfaced in PostgREST error bodies.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// A failure while talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    pub fn api(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code,
            message: message.into(),
        }
    }

    /// Classify the failure for the sync engine's retry policy.
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            Self::Network(err) if err.is_timeout() || err.is_connect() => {
                RemoteErrorKind::TransientNetwork
            }
            Self::Network(_) => RemoteErrorKind::Unknown,
            Self::Api { status, code, .. } => match status {
                401 | 403 => RemoteErrorKind::Auth,
                409 => RemoteErrorKind::Conflict,
                _ if code.as_deref() == Some(PG_UNIQUE_VIOLATION) => RemoteErrorKind::Conflict,
                408 | 429 | 500..=599 => RemoteErrorKind::TransientNetwork,
                _ => RemoteErrorKind::Unknown,
            },
            Self::Decode(_) => RemoteErrorKind::Unknown,
        }
    }
}

impl From<BackendError> for RemoteError {
    fn from(err: BackendError) -> Self {
        RemoteError::new(err.kind(), err.to_string())
    }
}
