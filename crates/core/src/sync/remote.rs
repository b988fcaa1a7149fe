//! Remote service contract: a thin typed facade over the hosted backend.
//!
//! The backend is failable, latency-bearing and idempotency-unaware: calling
//! a `create_*` twice with the same natural key yields a [`RemoteError`] of
//! kind `Conflict` (or a duplicate row where the constraint is missing), so
//! callers check existence first. None of these methods touch local state.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::RemoteError;
use crate::models::{ChatSession, CheckinEntry, JournalEntry, Message};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    // Chat sessions, keyed by the client-generated session id.
    async fn create_session(&self, user_id: &str, session: &ChatSession)
        -> Result<(), RemoteError>;
    async fn update_session(&self, user_id: &str, session: &ChatSession)
        -> Result<(), RemoteError>;
    /// Deletes the session; messages cascade server-side.
    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<(), RemoteError>;
    async fn get_session_by_client_id(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<ChatSession>, RemoteError>;
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, RemoteError>;

    // Messages, keyed by the client-generated message id. Immutable once
    // created; no update operation exists.
    async fn create_message(&self, user_id: &str, message: &Message) -> Result<(), RemoteError>;
    async fn get_message_by_client_id(
        &self,
        user_id: &str,
        message_id: &str,
    ) -> Result<Option<Message>, RemoteError>;
    async fn list_messages(&self, user_id: &str) -> Result<Vec<Message>, RemoteError>;

    // Check-ins. (user, date) is unique remotely; the UUID is the preferred
    // match key, the date the fallback.
    async fn create_checkin(&self, user_id: &str, entry: &CheckinEntry) -> Result<(), RemoteError>;
    async fn update_checkin(&self, user_id: &str, entry: &CheckinEntry) -> Result<(), RemoteError>;
    async fn get_checkin_by_uuid(
        &self,
        user_id: &str,
        checkin_id: &str,
    ) -> Result<Option<CheckinEntry>, RemoteError>;
    async fn get_checkin_by_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<CheckinEntry>, RemoteError>;
    async fn list_checkins(&self, user_id: &str) -> Result<Vec<CheckinEntry>, RemoteError>;

    // Journal entries, keyed by the client-generated UUID.
    async fn create_journal(&self, user_id: &str, entry: &JournalEntry) -> Result<(), RemoteError>;
    async fn update_journal(&self, user_id: &str, entry: &JournalEntry) -> Result<(), RemoteError>;
    async fn delete_journal(&self, user_id: &str, journal_id: &str) -> Result<(), RemoteError>;
    async fn get_journal_by_uuid(
        &self,
        user_id: &str,
        journal_id: &str,
    ) -> Result<Option<JournalEntry>, RemoteError>;
    async fn list_journals(&self, user_id: &str) -> Result<Vec<JournalEntry>, RemoteError>;
}
