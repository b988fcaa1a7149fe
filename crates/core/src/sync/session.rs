//! Authenticated-session state shared across the sync engine.

use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::{Error, Result};
use crate::sync::AuthSession;

/// Shared handle to the current authenticated session.
///
/// Cloned into the orchestrator's background task and into per-run guards;
/// login and logout swap the inner value.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<AuthSession>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, session: AuthSession) {
        *self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Clears the session, returning the one that was active.
    pub fn sign_out(&self) -> Option<AuthSession> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.user_id.clone())
    }

    /// Guard pinned to the user who started a sync run.
    pub fn guard(&self, user_id: &str) -> SessionGuard {
        SessionGuard {
            handle: self.clone(),
            user_id: user_id.to_string(),
        }
    }
}

/// Re-checked before committing any result inside a sync run.
///
/// An in-flight run cannot be cancelled, so every phase re-validates that the
/// user who started it is still signed in before writing; a run outlived by
/// its session abandons the rest of its work.
#[derive(Clone)]
pub struct SessionGuard {
    handle: SessionHandle,
    user_id: String,
}

impl SessionGuard {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_current(&self) -> bool {
        self.handle
            .user_id()
            .map(|id| id == self.user_id)
            .unwrap_or(false)
    }

    pub fn ensure_current(&self) -> Result<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(Error::SessionChanged {
                user_id: self.user_id.clone(),
            })
        }
    }
}
