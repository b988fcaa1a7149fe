//! Local record store contract: per-user namespaced keyed persistence.
//!
//! The device-side cache is a plain keyed object store (collections are
//! JSON-encoded arrays under one key each). Implementations only need
//! get/set/remove plus atomic multi-key variants; all namespacing and typing
//! lives here so every backend behaves identically.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::StoreError;

/// Prefix for every persisted key.
pub const KEY_PREFIX: &str = "mindwell";

/// Entity collections persisted per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    ChatSessions,
    Messages,
    Checkins,
    JournalEntries,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatSessions => "chat_sessions",
            Self::Messages => "messages",
            Self::Checkins => "checkins",
            Self::JournalEntries => "journal_entries",
        }
    }
}

/// Per-user scalar sync metadata.
///
/// Metadata shares the user namespace so nothing sync-related survives a
/// logout or bleeds into another account on a shared device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKey {
    LastSyncTime,
    PendingOperations,
    DeadLetterCount,
    SyncEnabled,
}

impl MetaKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastSyncTime => "last_sync_time",
            Self::PendingOperations => "pending_operations",
            Self::DeadLetterCount => "dead_letter_count",
            Self::SyncEnabled => "sync_enabled",
        }
    }
}

/// `mindwell:<user_id>:` — everything owned by one user lives under this.
pub fn namespace_prefix(user_id: &str) -> String {
    format!("{KEY_PREFIX}:{user_id}:")
}

/// Key for one user's collection of the given kind.
pub fn collection_key(user_id: &str, kind: RecordKind) -> String {
    format!("{KEY_PREFIX}:{user_id}:{}", kind.as_str())
}

/// Key for one user's scalar sync metadata value.
pub fn meta_key(user_id: &str, meta: MetaKey) -> String {
    format!("{KEY_PREFIX}:{user_id}:meta:{}", meta.as_str())
}

/// Keyed persistence capability.
///
/// Key-level atomicity: a reader never observes a partially written value.
/// `set_many`/`remove_many` are all-or-nothing. Read-your-writes holds within
/// the process.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;
    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<(), StoreError>;
    async fn remove_many(&self, keys: Vec<String>) -> Result<(), StoreError>;
}

/// Typed, user-namespaced view over a raw [`RecordStore`].
#[derive(Clone)]
pub struct UserRecords {
    store: std::sync::Arc<dyn RecordStore>,
}

impl UserRecords {
    pub fn new(store: std::sync::Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Load one user's collection, empty when never written.
    pub async fn load<T: DeserializeOwned>(
        &self,
        user_id: &str,
        kind: RecordKind,
    ) -> Result<Vec<T>, StoreError> {
        let key = collection_key(user_id, kind);
        match self.store.get(&key).await? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| StoreError::corrupt(key, e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Overwrite one user's collection wholesale.
    pub async fn save<T: Serialize>(
        &self,
        user_id: &str,
        kind: RecordKind,
        records: &[T],
    ) -> Result<(), StoreError> {
        let key = collection_key(user_id, kind);
        let raw = serde_json::to_string(records)
            .map_err(|e| StoreError::backend(format!("encode '{key}': {e}")))?;
        self.store.set(&key, raw).await
    }

    pub async fn meta(&self, user_id: &str, meta: MetaKey) -> Result<Option<String>, StoreError> {
        self.store.get(&meta_key(user_id, meta)).await
    }

    pub async fn set_meta(
        &self,
        user_id: &str,
        meta: MetaKey,
        value: String,
    ) -> Result<(), StoreError> {
        self.store.set(&meta_key(user_id, meta), value).await
    }

    /// Remove every key in the user's namespace — and nothing else.
    pub async fn clear_namespace(&self, user_id: &str) -> Result<(), StoreError> {
        let prefix = namespace_prefix(user_id);
        let doomed = self
            .store
            .list_keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .collect::<Vec<_>>();
        if doomed.is_empty() {
            return Ok(());
        }
        self.store.remove_many(doomed).await
    }
}

/// In-memory record store for tests and ephemeral embedding.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries().keys().cloned().collect())
    }

    async fn set_many(&self, batch: Vec<(String, String)>) -> Result<(), StoreError> {
        let mut entries = self.entries();
        for (key, value) in batch {
            entries.insert(key, value);
        }
        Ok(())
    }

    async fn remove_many(&self, keys: Vec<String>) -> Result<(), StoreError> {
        let mut entries = self.entries();
        for key in keys {
            entries.remove(&key);
        }
        Ok(())
    }
}
