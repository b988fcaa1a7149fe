//! SQLite-backed record store.
//!
//! One `records` table of JSON payloads keyed by the namespaced record key.
//! Statements run on the blocking pool behind a single connection; the
//! per-key upsert gives readers the key-level atomicity the store contract
//! requires, and multi-key writes run inside one transaction.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use mindwell_core::store::RecordStore;
use mindwell_core::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
";

/// Durable key-value store over a single SQLite database file.
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

fn db_err(err: rusqlite::Error) -> StoreError {
    StoreError::backend(err.to_string())
}

impl SqliteRecordStore {
    /// Open (and create if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        Self::init(conn)
    }

    /// Ephemeral store for tests and previews.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!("[Store] SQLite record store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::backend(format!("blocking task failed: {e}")))?
        .map_err(db_err)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO records (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ON CONFLICT(key) DO UPDATE
                 SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value],
            )
            .map(|_| ())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM records WHERE key = ?1", params![key])
                .map(|_| ())
        })
        .await
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM records ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
        .await
    }

    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO records (key, value, updated_at)
                     VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                     ON CONFLICT(key) DO UPDATE
                     SET value = excluded.value, updated_at = excluded.updated_at",
                )?;
                for (key, value) in &entries {
                    stmt.execute(params![key, value])?;
                }
            }
            tx.commit()
        })
        .await
    }

    async fn remove_many(&self, keys: Vec<String>) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("DELETE FROM records WHERE key = ?1")?;
                for key in &keys {
                    stmt.execute(params![key])?;
                }
            }
            tx.commit()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mindwell_core::models::JournalEntry;
    use mindwell_core::store::{MetaKey, RecordKind, RecordStore, UserRecords};

    use super::*;

    #[tokio::test]
    async fn read_your_writes_within_process() {
        let store = SqliteRecordStore::open_in_memory().expect("open");
        store
            .set("mindwell:user-a:checkins", "[]".into())
            .await
            .expect("set");
        assert_eq!(
            store.get("mindwell:user-a:checkins").await.expect("get"),
            Some("[]".to_string())
        );
        assert_eq!(store.get("mindwell:user-b:checkins").await.expect("get"), None);
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let store = SqliteRecordStore::open_in_memory().expect("open");
        store.set("k", "one".into()).await.expect("set");
        store.set("k", "two".into()).await.expect("overwrite");
        assert_eq!(store.get("k").await.expect("get"), Some("two".to_string()));
        assert_eq!(store.list_keys().await.expect("keys").len(), 1);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.db");

        {
            let store = SqliteRecordStore::open(&path).expect("open");
            store
                .set(
                    "mindwell:user-a:meta:pending_operations",
                    r#"[{"id":"msg-1"}]"#.into(),
                )
                .await
                .expect("set");
        }

        let store = SqliteRecordStore::open(&path).expect("reopen");
        assert_eq!(
            store
                .get("mindwell:user-a:meta:pending_operations")
                .await
                .expect("get"),
            Some(r#"[{"id":"msg-1"}]"#.to_string())
        );
    }

    #[tokio::test]
    async fn remove_many_is_all_or_nothing_per_call() {
        let store = SqliteRecordStore::open_in_memory().expect("open");
        store
            .set_many(vec![
                ("a".into(), "1".into()),
                ("b".into(), "2".into()),
                ("c".into(), "3".into()),
            ])
            .await
            .expect("set_many");

        store
            .remove_many(vec!["a".into(), "c".into()])
            .await
            .expect("remove_many");
        assert_eq!(store.list_keys().await.expect("keys"), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn works_under_the_typed_user_records_layer() {
        let store: Arc<dyn RecordStore> =
            Arc::new(SqliteRecordStore::open_in_memory().expect("open"));
        let records = UserRecords::new(store);

        let entry = JournalEntry::new("jr-1", "Evening", "wrote things down", chrono::Utc::now());
        records
            .save("user-a", RecordKind::JournalEntries, &[entry.clone()])
            .await
            .expect("save");
        records
            .set_meta("user-a", MetaKey::LastSyncTime, "2024-06-01T08:00:00Z".into())
            .await
            .expect("meta");

        let loaded: Vec<JournalEntry> = records
            .load("user-a", RecordKind::JournalEntries)
            .await
            .expect("load");
        assert_eq!(loaded, vec![entry]);

        records.clear_namespace("user-a").await.expect("clear");
        let loaded: Vec<JournalEntry> = records
            .load("user-a", RecordKind::JournalEntries)
            .await
            .expect("load after clear");
        assert!(loaded.is_empty());
        assert!(records
            .meta("user-a", MetaKey::LastSyncTime)
            .await
            .expect("meta after clear")
            .is_none());
    }
}
