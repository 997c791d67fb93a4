//! Runtime for handling study conversations
//!
//! One inbound event (a message or a button press) is one unit of work.
//! Work for the same chat is serialized in-process; different chats run
//! concurrently.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::StudyRuntime;
pub use traits::*;

use crate::article::HttpArticleFetcher;
use crate::telegram::TelegramClient;
use crate::telemetry::LangfuseClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = StudyRuntime<
    DatabaseSessionStore,
    ServiceLlmClient,
    HttpArticleFetcher,
    TelegramClient,
    Option<LangfuseClient>,
>;

/// Inbound event, already stripped of transport details
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message {
        chat_id: String,
        text: String,
    },
    /// Inline keyboard press; `data` is `tag` or `tag:correlation`
    Action {
        chat_id: String,
        callback_id: String,
        message_id: i64,
        data: String,
    },
    /// Press on a message too old for Telegram to include; only the
    /// spinner can be stopped
    DetachedAction { callback_id: String },
}

/// Per-chat async locks
///
/// Entries nobody holds or waits on are pruned on the next acquire.
#[derive(Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationLocks {
    pub async fn acquire(&self, chat_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            locks.retain(|key, lock| key == chat_id || Arc::strong_count(lock) > 1);
            locks.entry(chat_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}
