//! Trait abstractions for runtime I/O
//!
//! The runtime only sees these ports, so tests can swap every external
//! collaborator for an in-memory one.

use crate::article::{Article, FetchError, HttpArticleFetcher};
use crate::db::{Database, DbError, Session};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::telegram::{InlineKeyboard, TelegramClient, TransportError};
use crate::telemetry::{LangfuseClient, PromptOverride};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Keyed session persistence with refresh-on-write expiry
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session; absent or expired reads as empty
    async fn load(&self, chat_id: &str) -> Result<Session, DbError>;

    /// Persist a session, trimming history and restarting its expiry
    async fn save(&self, chat_id: &str, session: &Session) -> Result<(), DbError>;

    async fn clear(&self, chat_id: &str) -> Result<(), DbError>;
}

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Resolves a URL to readable study text
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Article, FetchError>;
}

/// Outbound chat delivery
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError>;

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), TransportError>;

    async fn clear_keyboard(&self, chat_id: &str, message_id: i64) -> Result<(), TransportError>;
}

/// Best-effort telemetry and managed prompts
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Managed replacement for a built-in instruction, if any
    async fn prompt_override(&self, name: &str) -> Option<PromptOverride>;

    /// Hand off an ingestion batch without waiting for delivery
    fn submit(&self, payload: Value);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn load(&self, chat_id: &str) -> Result<Session, DbError> {
        (**self).load(chat_id).await
    }

    async fn save(&self, chat_id: &str, session: &Session) -> Result<(), DbError> {
        (**self).save(chat_id, session).await
    }

    async fn clear(&self, chat_id: &str) -> Result<(), DbError> {
        (**self).clear(chat_id).await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: ArticleFetcher + ?Sized> ArticleFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<Article, FetchError> {
        (**self).fetch(url).await
    }
}

#[async_trait]
impl<T: Messenger + ?Sized> Messenger for Arc<T> {
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        (**self).send_text(chat_id, text, keyboard).await
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id, text).await
    }

    async fn clear_keyboard(&self, chat_id: &str, message_id: i64) -> Result<(), TransportError> {
        (**self).clear_keyboard(chat_id, message_id).await
    }
}

#[async_trait]
impl<T: TelemetrySink + ?Sized> TelemetrySink for Arc<T> {
    async fn prompt_override(&self, name: &str) -> Option<PromptOverride> {
        (**self).prompt_override(name).await
    }

    fn submit(&self, payload: Value) {
        (**self).submit(payload);
    }
}

/// Telemetry is optional; `None` drops everything
#[async_trait]
impl<T: TelemetrySink> TelemetrySink for Option<T> {
    async fn prompt_override(&self, name: &str) -> Option<PromptOverride> {
        match self {
            Some(sink) => sink.prompt_override(name).await,
            None => None,
        }
    }

    fn submit(&self, payload: Value) {
        if let Some(sink) = self {
            sink.submit(payload);
        }
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use `Database` as a `SessionStore`
#[derive(Clone)]
pub struct DatabaseSessionStore {
    db: Database,
    max_history: usize,
    ttl: Duration,
}

impl DatabaseSessionStore {
    pub fn new(db: Database, max_history: usize, ttl: Duration) -> Self {
        Self {
            db,
            max_history,
            ttl,
        }
    }
}

#[async_trait]
impl SessionStore for DatabaseSessionStore {
    async fn load(&self, chat_id: &str) -> Result<Session, DbError> {
        let record = self.db.get_session(chat_id)?.unwrap_or_default();
        Ok(Session::from_record(record))
    }

    async fn save(&self, chat_id: &str, session: &Session) -> Result<(), DbError> {
        self.db
            .put_session(chat_id, &session.to_record(self.max_history), self.ttl)
    }

    async fn clear(&self, chat_id: &str) -> Result<(), DbError> {
        self.db.delete_session(chat_id)
    }
}

/// Adapter to use an `LlmService` as `LlmClient`
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service.complete(request).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<Article, FetchError> {
        HttpArticleFetcher::fetch(self, url).await
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        TelegramClient::send_text(self, chat_id, text, keyboard).await
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), TransportError> {
        TelegramClient::answer_callback(self, callback_id, text).await
    }

    async fn clear_keyboard(&self, chat_id: &str, message_id: i64) -> Result<(), TransportError> {
        TelegramClient::clear_keyboard(self, chat_id, message_id).await
    }
}

#[async_trait]
impl TelemetrySink for LangfuseClient {
    async fn prompt_override(&self, name: &str) -> Option<PromptOverride> {
        self.fetch_prompt(name).await
    }

    fn submit(&self, payload: Value) {
        self.dispatch(payload);
    }
}
