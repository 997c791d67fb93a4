//! HTTP API: the Telegram webhook and a health probe

mod handlers;
mod types;

pub use handlers::create_router;

use crate::db::DbError;
use crate::runtime::{
    ArticleFetcher, InboundEvent, LlmClient, Messenger, SessionStore, StudyRuntime, TelemetrySink,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Whatever processes inbound events for the webhook
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent) -> Result<(), DbError>;
}

#[async_trait]
impl<S, L, F, M, T> EventHandler for StudyRuntime<S, L, F, M, T>
where
    S: SessionStore,
    L: LlmClient,
    F: ArticleFetcher,
    M: Messenger,
    T: TelemetrySink,
{
    async fn handle(&self, event: InboundEvent) -> Result<(), DbError> {
        StudyRuntime::handle(self, event).await
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<dyn EventHandler>,
    pub webhook_secret: Arc<str>,
}

impl AppState {
    pub fn new(runtime: Arc<dyn EventHandler>, webhook_secret: &str) -> Self {
        Self {
            runtime,
            webhook_secret: Arc::from(webhook_secret),
        }
    }
}
