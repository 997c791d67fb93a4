//! Mock implementations for testing
//!
//! These mocks enable end-to-end runtime tests without real I/O.

use super::traits::*;
use crate::article::{Article, FetchError};
use crate::db::{DbError, Session, SessionRecord};
use crate::llm::{FinishReason, LlmError, LlmRequest, LlmResponse, Usage};
use crate::telegram::{InlineKeyboard, TransportError};
use crate::telemetry::PromptOverride;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a plain completed response with token usage
    pub fn queue_text(&self, text: &str) {
        self.queue_response(LlmResponse {
            text: text.to_string(),
            finish_reason: FinishReason::Stop,
            usage: Some(Usage {
                input_tokens: 3,
                output_tokens: 4,
                total_tokens: 7,
            }),
        });
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// In-memory session store
// ============================================================================

/// Stores sessions in their persisted shape, trimmed like the real store
pub struct MemoryStore {
    records: Mutex<HashMap<String, SessionRecord>>,
    max_history: usize,
    pub saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            max_history,
            saves: Mutex::new(0),
        }
    }

    pub fn record(&self, chat_id: &str) -> Option<SessionRecord> {
        self.records.lock().unwrap().get(chat_id).cloned()
    }

    pub fn insert(&self, chat_id: &str, record: SessionRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), record);
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, chat_id: &str) -> Result<Session, DbError> {
        Ok(Session::from_record(self.record(chat_id).unwrap_or_default()))
    }

    async fn save(&self, chat_id: &str, session: &Session) -> Result<(), DbError> {
        *self.saves.lock().unwrap() += 1;
        self.insert(chat_id, session.to_record(self.max_history));
        Ok(())
    }

    async fn clear(&self, chat_id: &str) -> Result<(), DbError> {
        self.records.lock().unwrap().remove(chat_id);
        Ok(())
    }
}

// ============================================================================
// Recording messenger
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text {
        chat_id: String,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    CallbackAnswer {
        callback_id: String,
        text: String,
    },
    KeyboardCleared {
        chat_id: String,
        message_id: i64,
    },
}

/// Records every delivery instead of sending it
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<Outbound>>,
}

impl RecordingMessenger {
    pub fn outbound(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts delivered as chat messages, in order
    pub fn texts(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Keyboard attached to the most recent chat message
    pub fn last_keyboard(&self) -> Option<InlineKeyboard> {
        self.outbound().into_iter().rev().find_map(|o| match o {
            Outbound::Text { keyboard, .. } => Some(keyboard),
            _ => None,
        })?
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Outbound::Text {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Outbound::CallbackAnswer {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn clear_keyboard(&self, chat_id: &str, message_id: i64) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Outbound::KeyboardCleared {
            chat_id: chat_id.to_string(),
            message_id,
        });
        Ok(())
    }
}

// ============================================================================
// Static article fetcher
// ============================================================================

/// Serves canned articles by URL; anything else fails as empty
#[derive(Default)]
pub struct StaticArticleFetcher {
    articles: HashMap<String, Article>,
    pub fetched: Mutex<Vec<String>>,
}

impl StaticArticleFetcher {
    pub fn with_article(mut self, url: &str, text: &str, truncated: bool) -> Self {
        self.articles.insert(
            url.to_string(),
            Article {
                text: text.to_string(),
                truncated,
            },
        );
        self
    }
}

#[async_trait]
impl ArticleFetcher for StaticArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<Article, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.articles.get(url).cloned().ok_or(FetchError::Empty)
    }
}

// ============================================================================
// Recording telemetry
// ============================================================================

#[derive(Default)]
pub struct RecordingTelemetry {
    pub prompt: Option<PromptOverride>,
    pub submitted: Mutex<Vec<Value>>,
}

impl RecordingTelemetry {
    pub fn with_prompt(prompt: &str, version: i64) -> Self {
        Self {
            prompt: Some(PromptOverride {
                prompt: prompt.to_string(),
                version: Some(version),
            }),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelemetrySink for RecordingTelemetry {
    async fn prompt_override(&self, _name: &str) -> Option<PromptOverride> {
        self.prompt.clone()
    }

    fn submit(&self, payload: Value) {
        self.submitted.lock().unwrap().push(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_llm_client() {
        let client = MockLlmClient::new("test-model");
        client.queue_text("Hello!");

        let request = LlmRequest::single("system", "Hi");
        let response = client.complete(&request).await.unwrap();
        assert_eq!(response.text, "Hello!");
        assert_eq!(client.recorded_requests().len(), 1);

        // Nothing queued
        assert!(client.complete(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_trims_on_save() {
        let store = MemoryStore::new(1);
        let mut session = store.load("c").await.unwrap();
        session.history.push(crate::db::Turn::user("a"));
        session.history.push(crate::db::Turn::model("b"));
        store.save("c", &session).await.unwrap();

        assert_eq!(store.record("c").unwrap().history.len(), 1);
        assert_eq!(store.save_count(), 1);
    }
}
