//! Per-entity convergence between the local record store and the backend.
//!
//! To-cloud walks each local record, matching remotely by natural key (UUID
//! first when the entity carries one, then the domain key such as the
//! check-in date) and issuing an update or a create accordingly. From-cloud
//! fetches the user's remote collection and overwrites the local copy
//! wholesale — last fetch wins, no field-level merge. Bidirectional sync
//! pushes before pulling, so a remote-only edit made by another device in
//! that window can overwrite local edits not yet pushed; an accepted,
//! documented weakness of the whole-record LWW policy.

use std::sync::Arc;

use log::{debug, warn};

use crate::errors::{RemoteError, Result};
use crate::models::{ChatSession, CheckinEntry, JournalEntry, Message};
use crate::store::{RecordKind, RecordStore, UserRecords};
use crate::sync::keys::new_entry_uuid;
use crate::sync::{RemoteStore, SessionGuard};

/// Counters from one to-cloud pass over a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub created: usize,
    pub updated: usize,
    /// Records already converged; nothing was written.
    pub unchanged: usize,
    /// Records skipped after an isolated failure.
    pub failed: usize,
}

impl PushReport {
    pub fn absorb(&mut self, other: PushReport) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }

    fn count(&mut self, outcome: Pushed) {
        match outcome {
            Pushed::Created => self.created += 1,
            Pushed::Updated => self.updated += 1,
            Pushed::Unchanged => self.unchanged += 1,
        }
    }
}

enum Pushed {
    Created,
    Updated,
    Unchanged,
}

/// Converges local and remote collections for one user.
pub struct Reconciler {
    records: UserRecords,
    remote: Arc<dyn RemoteStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            records: UserRecords::new(store),
            remote,
        }
    }

    // ── to-cloud ────────────────────────────────────────────────────────────

    /// Push local check-ins. Both the existing-by-UUID and existing-by-date
    /// checks run before any insert so one (user, date) pair never gains a
    /// second remote row. Per-record failures are isolated: logged, counted,
    /// and the rest of the batch continues. Auth failures abort the batch.
    pub async fn push_checkins(&self, guard: &SessionGuard) -> Result<PushReport> {
        let user_id = guard.user_id();
        let mut entries: Vec<CheckinEntry> =
            self.records.load(user_id, RecordKind::Checkins).await?;
        let mut report = PushReport::default();
        let mut assigned_uuid = false;

        for entry in entries.iter_mut() {
            guard.ensure_current()?;
            let had_uuid = entry.checkin_id.is_some();
            match self.push_one_checkin(user_id, entry).await {
                Ok(outcome) => {
                    report.count(outcome);
                    if !had_uuid && entry.checkin_id.is_some() {
                        assigned_uuid = true;
                    }
                }
                Err(err) if err.is_auth() => return Err(err.into()),
                Err(err) => {
                    warn!("[Sync] Skipping check-in {}: {}", entry.date, err);
                    report.failed += 1;
                }
            }
        }

        if assigned_uuid {
            guard.ensure_current()?;
            self.records
                .save(user_id, RecordKind::Checkins, &entries)
                .await?;
        }
        Ok(report)
    }

    async fn push_one_checkin(
        &self,
        user_id: &str,
        entry: &mut CheckinEntry,
    ) -> Result<Pushed, RemoteError> {
        if let Some(checkin_id) = entry.checkin_id.clone() {
            if self
                .remote
                .get_checkin_by_uuid(user_id, &checkin_id)
                .await?
                .is_some()
            {
                self.remote.update_checkin(user_id, entry).await?;
                return Ok(Pushed::Updated);
            }
        }

        if let Some(existing) = self.remote.get_checkin_by_date(user_id, entry.date).await? {
            // Adopt the remote UUID so later runs match without the date probe.
            if entry.checkin_id.is_none() {
                entry.checkin_id = existing.checkin_id;
            }
            self.remote.update_checkin(user_id, entry).await?;
            return Ok(Pushed::Updated);
        }

        if entry.checkin_id.is_none() {
            entry.checkin_id = Some(new_entry_uuid());
        }
        match self.remote.create_checkin(user_id, entry).await {
            Ok(()) => Ok(Pushed::Created),
            Err(err) if err.is_conflict() => {
                // A row appeared between the existence check and the insert.
                self.remote.update_checkin(user_id, entry).await?;
                Ok(Pushed::Updated)
            }
            Err(err) => Err(err),
        }
    }

    /// Push local journal entries, matching remotely by UUID.
    pub async fn push_journals(&self, guard: &SessionGuard) -> Result<PushReport> {
        let user_id = guard.user_id();
        let mut entries: Vec<JournalEntry> = self
            .records
            .load(user_id, RecordKind::JournalEntries)
            .await?;
        let mut report = PushReport::default();
        let mut assigned_uuid = false;

        for entry in entries.iter_mut() {
            guard.ensure_current()?;
            let had_uuid = entry.journal_id.is_some();
            match self.push_one_journal(user_id, entry).await {
                Ok(outcome) => {
                    report.count(outcome);
                    if !had_uuid && entry.journal_id.is_some() {
                        assigned_uuid = true;
                    }
                }
                Err(err) if err.is_auth() => return Err(err.into()),
                Err(err) => {
                    warn!("[Sync] Skipping journal entry '{}': {}", entry.title, err);
                    report.failed += 1;
                }
            }
        }

        if assigned_uuid {
            guard.ensure_current()?;
            self.records
                .save(user_id, RecordKind::JournalEntries, &entries)
                .await?;
        }
        Ok(report)
    }

    async fn push_one_journal(
        &self,
        user_id: &str,
        entry: &mut JournalEntry,
    ) -> Result<Pushed, RemoteError> {
        if let Some(journal_id) = entry.journal_id.clone() {
            if self
                .remote
                .get_journal_by_uuid(user_id, &journal_id)
                .await?
                .is_some()
            {
                self.remote.update_journal(user_id, entry).await?;
                return Ok(Pushed::Updated);
            }
        }

        if entry.journal_id.is_none() {
            entry.journal_id = Some(new_entry_uuid());
        }
        match self.remote.create_journal(user_id, entry).await {
            Ok(()) => Ok(Pushed::Created),
            Err(err) if err.is_conflict() => {
                self.remote.update_journal(user_id, entry).await?;
                Ok(Pushed::Updated)
            }
            Err(err) => Err(err),
        }
    }

    /// Push local chat sessions, matching remotely by the client session id.
    pub async fn push_sessions(&self, guard: &SessionGuard) -> Result<PushReport> {
        let user_id = guard.user_id();
        let sessions: Vec<ChatSession> =
            self.records.load(user_id, RecordKind::ChatSessions).await?;
        let mut report = PushReport::default();

        for session in &sessions {
            guard.ensure_current()?;
            match self.push_one_session(user_id, session).await {
                Ok(outcome) => report.count(outcome),
                Err(err) if err.is_auth() => return Err(err.into()),
                Err(err) => {
                    warn!("[Sync] Skipping chat session {}: {}", session.id, err);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn push_one_session(
        &self,
        user_id: &str,
        session: &ChatSession,
    ) -> Result<Pushed, RemoteError> {
        if self
            .remote
            .get_session_by_client_id(user_id, &session.id)
            .await?
            .is_some()
        {
            self.remote.update_session(user_id, session).await?;
            return Ok(Pushed::Updated);
        }
        match self.remote.create_session(user_id, session).await {
            Ok(()) => Ok(Pushed::Created),
            Err(err) if err.is_conflict() => {
                self.remote.update_session(user_id, session).await?;
                Ok(Pushed::Updated)
            }
            Err(err) => Err(err),
        }
    }

    /// Push local messages. Messages are immutable after creation, so a
    /// message that already exists remotely is left untouched.
    pub async fn push_messages(&self, guard: &SessionGuard) -> Result<PushReport> {
        let user_id = guard.user_id();
        let messages: Vec<Message> = self.records.load(user_id, RecordKind::Messages).await?;
        let mut report = PushReport::default();

        for message in &messages {
            guard.ensure_current()?;
            match self.push_one_message(user_id, message).await {
                Ok(outcome) => report.count(outcome),
                Err(err) if err.is_auth() => return Err(err.into()),
                Err(err) => {
                    warn!("[Sync] Skipping message {}: {}", message.id, err);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn push_one_message(
        &self,
        user_id: &str,
        message: &Message,
    ) -> Result<Pushed, RemoteError> {
        if self
            .remote
            .get_message_by_client_id(user_id, &message.id)
            .await?
            .is_some()
        {
            return Ok(Pushed::Unchanged);
        }
        match self.remote.create_message(user_id, message).await {
            Ok(()) => Ok(Pushed::Created),
            // Created via another path (e.g. the streaming proxy).
            Err(err) if err.is_conflict() => Ok(Pushed::Unchanged),
            Err(err) => Err(err),
        }
    }

    /// To-cloud pass over every entity kind.
    pub async fn push_all(&self, guard: &SessionGuard) -> Result<PushReport> {
        let mut report = self.push_sessions(guard).await?;
        report.absorb(self.push_messages(guard).await?);
        report.absorb(self.push_checkins(guard).await?);
        report.absorb(self.push_journals(guard).await?);
        Ok(report)
    }

    // ── from-cloud ──────────────────────────────────────────────────────────

    pub async fn pull_sessions(&self, guard: &SessionGuard) -> Result<usize> {
        let remote = self.remote.list_sessions(guard.user_id()).await?;
        self.overwrite(guard, RecordKind::ChatSessions, &remote)
            .await?;
        Ok(remote.len())
    }

    pub async fn pull_messages(&self, guard: &SessionGuard) -> Result<usize> {
        let remote = self.remote.list_messages(guard.user_id()).await?;
        self.overwrite(guard, RecordKind::Messages, &remote).await?;
        Ok(remote.len())
    }

    pub async fn pull_checkins(&self, guard: &SessionGuard) -> Result<usize> {
        let remote = self.remote.list_checkins(guard.user_id()).await?;
        self.overwrite(guard, RecordKind::Checkins, &remote).await?;
        Ok(remote.len())
    }

    pub async fn pull_journals(&self, guard: &SessionGuard) -> Result<usize> {
        let remote = self.remote.list_journals(guard.user_id()).await?;
        self.overwrite(guard, RecordKind::JournalEntries, &remote)
            .await?;
        Ok(remote.len())
    }

    /// From-cloud pass over every entity kind.
    pub async fn pull_all(&self, guard: &SessionGuard) -> Result<usize> {
        let mut pulled = self.pull_sessions(guard).await?;
        pulled += self.pull_messages(guard).await?;
        pulled += self.pull_checkins(guard).await?;
        pulled += self.pull_journals(guard).await?;
        Ok(pulled)
    }

    async fn overwrite<T: serde::Serialize>(
        &self,
        guard: &SessionGuard,
        kind: RecordKind,
        remote: &[T],
    ) -> Result<()> {
        // The fetch suspended; re-validate the session before committing.
        guard.ensure_current()?;
        self.records.save(guard.user_id(), kind, remote).await?;
        debug!(
            "[Sync] Replaced local {} with {} remote records",
            kind.as_str(),
            remote.len()
        );
        Ok(())
    }
}
