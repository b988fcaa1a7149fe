//! Durable retry queue for deferred remote writes.
//!
//! Chat mutations are written locally first and their remote writes pushed
//! through this queue so a dropped connection never loses a turn. The queue
//! is persisted under the user's namespace; a crash between the local
//! mutation and remote confirmation leaves the item queued. Mutual exclusion
//! during a drain comes from the orchestrator's single-flight guard, not
//! from queue-internal locking.

use std::sync::Arc;

use log::{debug, warn};

use crate::errors::{RemoteError, Result, StoreError};
use crate::models::{ChatSession, CheckinEntry, JournalEntry, Message};
use crate::store::{meta_key, MetaKey, RecordStore, UserRecords};
use crate::sync::{
    QueuedWrite, RemoteStore, SessionGuard, SyncEntity, SyncOperation, MAX_WRITE_ATTEMPTS,
};

/// Counters from one queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Confirmed remotely, including duplicate-key conflicts treated as
    /// success-by-equivalence.
    pub delivered: usize,
    /// Failed and kept for another attempt.
    pub requeued: usize,
    /// Dropped after exhausting the retry budget.
    pub dead_lettered: usize,
}

/// Durable, deduplicated queue of pending remote writes.
pub struct RetryQueue {
    records: UserRecords,
}

impl RetryQueue {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            records: UserRecords::new(store),
        }
    }

    async fn load(&self, user_id: &str) -> Result<Vec<QueuedWrite>, StoreError> {
        match self.records.meta(user_id, MetaKey::PendingOperations).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StoreError::corrupt(meta_key(user_id, MetaKey::PendingOperations), e.to_string())
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, user_id: &str, items: &[QueuedWrite]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(items)
            .map_err(|e| StoreError::backend(format!("encode pending operations: {e}")))?;
        self.records
            .set_meta(user_id, MetaKey::PendingOperations, raw)
            .await
    }

    /// Enqueue a write, deduplicated by item id: re-enqueueing an id already
    /// present replaces the stored item instead of appending a duplicate.
    pub async fn enqueue(&self, user_id: &str, write: QueuedWrite) -> Result<()> {
        let mut items = self.load(user_id).await?;
        match items.iter_mut().find(|item| item.id == write.id) {
            Some(existing) => *existing = write,
            None => items.push(write),
        }
        self.save(user_id, &items).await?;
        Ok(())
    }

    pub async fn len(&self, user_id: &str) -> Result<usize> {
        Ok(self.load(user_id).await?.len())
    }

    /// Writes dropped so far after exhausting their retry budget.
    pub async fn dead_letter_count(&self, user_id: &str) -> Result<u64> {
        let raw = self.records.meta(user_id, MetaKey::DeadLetterCount).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Attempt every pending write against the backend.
    ///
    /// Success and duplicate-key conflicts remove the item; other failures
    /// re-enqueue it with an incremented retry count until the budget
    /// (`MAX_WRITE_ATTEMPTS`) is spent, after which the item moves to the
    /// dead-letter counter. An auth failure stops the drain with the
    /// remaining items intact and propagates so the session gets torn down.
    pub async fn drain(&self, guard: &SessionGuard, remote: &dyn RemoteStore) -> Result<DrainReport> {
        let user_id = guard.user_id();
        let items = self.load(user_id).await?;
        if items.is_empty() {
            return Ok(DrainReport::default());
        }

        let mut report = DrainReport::default();
        let mut survivors: Vec<QueuedWrite> = Vec::new();
        let mut removed: Vec<String> = Vec::new();
        let mut pending = items.into_iter();

        while let Some(mut item) = pending.next() {
            guard.ensure_current()?;
            match self.attempt(user_id, remote, &item).await {
                Ok(()) => {
                    report.delivered += 1;
                    removed.push(item.id);
                }
                Err(err) if err.is_conflict() => {
                    // The write already landed via another path.
                    debug!("[Sync] Queued write {} already exists remotely", item.id);
                    report.delivered += 1;
                    removed.push(item.id);
                }
                Err(err) if err.is_auth() => {
                    survivors.push(item);
                    survivors.extend(pending);
                    self.persist(user_id, survivors, &removed).await?;
                    return Err(err.into());
                }
                Err(err) => {
                    item.retry_count += 1;
                    if item.retry_count >= MAX_WRITE_ATTEMPTS {
                        warn!(
                            "[Sync] Dropping write {} after {} attempts: {}",
                            item.id, item.retry_count, err
                        );
                        report.dead_lettered += 1;
                        removed.push(item.id);
                    } else {
                        debug!(
                            "[Sync] Requeueing write {} (attempt {}): {}",
                            item.id, item.retry_count, err
                        );
                        report.requeued += 1;
                        survivors.push(item);
                    }
                }
            }
        }

        guard.ensure_current()?;
        self.persist(user_id, survivors, &removed).await?;
        if report.dead_lettered > 0 {
            let total = self.dead_letter_count(user_id).await? + report.dead_lettered as u64;
            self.records
                .set_meta(user_id, MetaKey::DeadLetterCount, total.to_string())
                .await?;
        }
        Ok(report)
    }

    /// Persist the post-drain queue, folding in writes enqueued while the
    /// drain was awaiting remote calls. Items confirmed or dead-lettered
    /// during this drain stay removed; everything else is kept.
    async fn persist(
        &self,
        user_id: &str,
        mut survivors: Vec<QueuedWrite>,
        removed: &[String],
    ) -> Result<(), StoreError> {
        for item in self.load(user_id).await? {
            let superseded = survivors.iter().any(|s| s.id == item.id)
                || removed.iter().any(|id| *id == item.id);
            if !superseded {
                survivors.push(item);
            }
        }
        self.save(user_id, &survivors).await
    }

    /// Map a queued write onto the matching remote call.
    async fn attempt(
        &self,
        user_id: &str,
        remote: &dyn RemoteStore,
        item: &QueuedWrite,
    ) -> Result<(), RemoteError> {
        fn decode<T: serde::de::DeserializeOwned>(
            item: &QueuedWrite,
        ) -> Result<T, RemoteError> {
            serde_json::from_value(item.payload.clone()).map_err(|e| {
                RemoteError::unknown(format!("undecodable payload for {}: {}", item.id, e))
            })
        }

        match (item.entity, item.op) {
            (SyncEntity::ChatSession, SyncOperation::Create) => {
                remote.create_session(user_id, &decode::<ChatSession>(item)?).await
            }
            (SyncEntity::ChatSession, SyncOperation::Update) => {
                remote.update_session(user_id, &decode::<ChatSession>(item)?).await
            }
            (SyncEntity::ChatSession, SyncOperation::Delete) => {
                remote.delete_session(user_id, &item.id).await
            }
            (SyncEntity::Message, SyncOperation::Create) => {
                remote.create_message(user_id, &decode::<Message>(item)?).await
            }
            (SyncEntity::Checkin, SyncOperation::Create) => {
                remote.create_checkin(user_id, &decode::<CheckinEntry>(item)?).await
            }
            (SyncEntity::Checkin, SyncOperation::Update) => {
                remote.update_checkin(user_id, &decode::<CheckinEntry>(item)?).await
            }
            (SyncEntity::JournalEntry, SyncOperation::Create) => {
                remote.create_journal(user_id, &decode::<JournalEntry>(item)?).await
            }
            (SyncEntity::JournalEntry, SyncOperation::Update) => {
                remote.update_journal(user_id, &decode::<JournalEntry>(item)?).await
            }
            (SyncEntity::JournalEntry, SyncOperation::Delete) => {
                remote.delete_journal(user_id, &item.id).await
            }
            (entity, op) => Err(RemoteError::unknown(format!(
                "unsupported queued operation {:?} {:?} for {}",
                op, entity, item.id
            ))),
        }
    }
}
