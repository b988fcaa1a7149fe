//! reqwest-backed implementation of the remote-store contract.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use mindwell_core::models::{ChatSession, CheckinEntry, JournalEntry, Message};
use mindwell_core::sync::{RemoteStore, REMOTE_CALL_TIMEOUT_SECS};
use mindwell_core::RemoteError;

use crate::error::BackendError;
use crate::types::{ChatSessionRow, CheckinRow, JournalRow, MessageRow};

const TABLE_SESSIONS: &str = "chat_sessions";
const TABLE_MESSAGES: &str = "messages";
const TABLE_CHECKINS: &str = "checkins";
const TABLE_JOURNALS: &str = "journal_entries";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Anonymous API key sent with every request.
    pub api_key: String,
}

/// Typed client for the backend's PostgREST row API.
///
/// Row filtering is always `user_id` plus the entity's client-generated
/// natural key; the server additionally enforces row ownership, so a stale
/// token can never read another user's rows.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

/// Error body shape returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    #[serde(default)]
    message: String,
}

fn eq(value: impl AsRef<str>) -> String {
    format!("eq.{}", value.as_ref())
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REMOTE_CALL_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            access_token: RwLock::new(None),
        })
    }

    /// Install the signed-in user's access token, or drop back to the
    /// anonymous key with `None`.
    pub fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let bearer = self
            .access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.api_key.clone());
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let parsed: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = if parsed.message.is_empty() {
            body
        } else {
            parsed.message
        };
        Err(BackendError::api(status.as_u16(), parsed.code, message))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, BackendError> {
        debug!("[Backend] GET {table} {filters:?}");
        let response = self
            .request(Method::GET, table)
            .query(filters)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Option<T>, BackendError> {
        let mut filters = filters.to_vec();
        filters.push(("limit", "1".to_string()));
        Ok(self.select(table, &filters).await?.into_iter().next())
    }

    async fn insert<T: Serialize>(&self, table: &str, row: &T) -> Result<(), BackendError> {
        debug!("[Backend] POST {table}");
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn update<T: Serialize>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        row: &T,
    ) -> Result<(), BackendError> {
        debug!("[Backend] PATCH {table} {filters:?}");
        let response = self
            .request(Method::PATCH, table)
            .query(filters)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn delete(&self, table: &str, filters: &[(&str, String)]) -> Result<(), BackendError> {
        debug!("[Backend] DELETE {table} {filters:?}");
        let response = self
            .request(Method::DELETE, table)
            .query(filters)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteStore for BackendClient {
    async fn create_session(
        &self,
        user_id: &str,
        session: &ChatSession,
    ) -> Result<(), RemoteError> {
        let row = ChatSessionRow::from_model(user_id, session);
        Ok(self.insert(TABLE_SESSIONS, &row).await?)
    }

    async fn update_session(
        &self,
        user_id: &str,
        session: &ChatSession,
    ) -> Result<(), RemoteError> {
        let row = ChatSessionRow::from_model(user_id, session);
        let filters = [("user_id", eq(user_id)), ("session_id", eq(&session.id))];
        Ok(self.update(TABLE_SESSIONS, &filters, &row).await?)
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<(), RemoteError> {
        // Message rows cascade off the session server-side.
        let filters = [("user_id", eq(user_id)), ("session_id", eq(session_id))];
        Ok(self.delete(TABLE_SESSIONS, &filters).await?)
    }

    async fn get_session_by_client_id(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<ChatSession>, RemoteError> {
        let filters = [("user_id", eq(user_id)), ("session_id", eq(session_id))];
        let row: Option<ChatSessionRow> = self.select_one(TABLE_SESSIONS, &filters).await?;
        Ok(row.map(ChatSessionRow::into_model))
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, RemoteError> {
        let filters = [
            ("user_id", eq(user_id)),
            ("order", "created_at.asc".to_string()),
        ];
        let rows: Vec<ChatSessionRow> = self.select(TABLE_SESSIONS, &filters).await?;
        Ok(rows.into_iter().map(ChatSessionRow::into_model).collect())
    }

    async fn create_message(&self, user_id: &str, message: &Message) -> Result<(), RemoteError> {
        let row = MessageRow::from_model(user_id, message);
        Ok(self.insert(TABLE_MESSAGES, &row).await?)
    }

    async fn get_message_by_client_id(
        &self,
        user_id: &str,
        message_id: &str,
    ) -> Result<Option<Message>, RemoteError> {
        let filters = [("user_id", eq(user_id)), ("message_id", eq(message_id))];
        let row: Option<MessageRow> = self.select_one(TABLE_MESSAGES, &filters).await?;
        Ok(row.map(MessageRow::into_model))
    }

    async fn list_messages(&self, user_id: &str) -> Result<Vec<Message>, RemoteError> {
        let filters = [
            ("user_id", eq(user_id)),
            ("order", "created_at.asc".to_string()),
        ];
        let rows: Vec<MessageRow> = self.select(TABLE_MESSAGES, &filters).await?;
        Ok(rows.into_iter().map(MessageRow::into_model).collect())
    }

    async fn create_checkin(&self, user_id: &str, entry: &CheckinEntry) -> Result<(), RemoteError> {
        let row = CheckinRow::from_model(user_id, entry);
        Ok(self.insert(TABLE_CHECKINS, &row).await?)
    }

    async fn update_checkin(&self, user_id: &str, entry: &CheckinEntry) -> Result<(), RemoteError> {
        // The date is the server-side unique key, so it addresses the row
        // even when the local record predates UUID assignment.
        let row = CheckinRow::from_model(user_id, entry);
        let filters = [
            ("user_id", eq(user_id)),
            ("date", eq(entry.date.format("%Y-%m-%d").to_string())),
        ];
        Ok(self.update(TABLE_CHECKINS, &filters, &row).await?)
    }

    async fn get_checkin_by_uuid(
        &self,
        user_id: &str,
        checkin_id: &str,
    ) -> Result<Option<CheckinEntry>, RemoteError> {
        let filters = [("user_id", eq(user_id)), ("checkin_id", eq(checkin_id))];
        let row: Option<CheckinRow> = self.select_one(TABLE_CHECKINS, &filters).await?;
        Ok(row.map(CheckinRow::into_model))
    }

    async fn get_checkin_by_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<CheckinEntry>, RemoteError> {
        let filters = [
            ("user_id", eq(user_id)),
            ("date", eq(date.format("%Y-%m-%d").to_string())),
        ];
        let row: Option<CheckinRow> = self.select_one(TABLE_CHECKINS, &filters).await?;
        Ok(row.map(CheckinRow::into_model))
    }

    async fn list_checkins(&self, user_id: &str) -> Result<Vec<CheckinEntry>, RemoteError> {
        let filters = [("user_id", eq(user_id)), ("order", "date.asc".to_string())];
        let rows: Vec<CheckinRow> = self.select(TABLE_CHECKINS, &filters).await?;
        Ok(rows.into_iter().map(CheckinRow::into_model).collect())
    }

    async fn create_journal(&self, user_id: &str, entry: &JournalEntry) -> Result<(), RemoteError> {
        let journal_id = entry
            .journal_id
            .as_deref()
            .ok_or_else(|| RemoteError::unknown("journal entry has no id assigned"))?;
        let row = JournalRow::from_model(user_id, journal_id, entry);
        Ok(self.insert(TABLE_JOURNALS, &row).await?)
    }

    async fn update_journal(&self, user_id: &str, entry: &JournalEntry) -> Result<(), RemoteError> {
        let journal_id = entry
            .journal_id
            .as_deref()
            .ok_or_else(|| RemoteError::unknown("journal entry has no id assigned"))?;
        let row = JournalRow::from_model(user_id, journal_id, entry);
        let filters = [("user_id", eq(user_id)), ("journal_id", eq(journal_id))];
        Ok(self.update(TABLE_JOURNALS, &filters, &row).await?)
    }

    async fn delete_journal(&self, user_id: &str, journal_id: &str) -> Result<(), RemoteError> {
        let filters = [("user_id", eq(user_id)), ("journal_id", eq(journal_id))];
        Ok(self.delete(TABLE_JOURNALS, &filters).await?)
    }

    async fn get_journal_by_uuid(
        &self,
        user_id: &str,
        journal_id: &str,
    ) -> Result<Option<JournalEntry>, RemoteError> {
        let filters = [("user_id", eq(user_id)), ("journal_id", eq(journal_id))];
        let row: Option<JournalRow> = self.select_one(TABLE_JOURNALS, &filters).await?;
        Ok(row.map(JournalRow::into_model))
    }

    async fn list_journals(&self, user_id: &str) -> Result<Vec<JournalEntry>, RemoteError> {
        let filters = [
            ("user_id", eq(user_id)),
            ("order", "created_at.desc".to_string()),
        ];
        let rows: Vec<JournalRow> = self.select(TABLE_JOURNALS, &filters).await?;
        Ok(rows.into_iter().map(JournalRow::into_model).collect())
    }
}
