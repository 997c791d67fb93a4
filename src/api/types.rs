//! Telegram update payloads and API responses
//!
//! Only the fields the tutor reads are modelled; everything else in an
//! update is ignored.

use crate::runtime::InboundEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    /// Absent when the keyboard message is too old for Telegram to include
    #[serde(default)]
    pub message: Option<Message>,
}

impl Update {
    /// The event this update carries, if any; button presses win over messages
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(cb) = self.callback_query {
            let Some(message) = cb.message else {
                return Some(InboundEvent::DetachedAction { callback_id: cb.id });
            };
            return Some(InboundEvent::Action {
                chat_id: message.chat.id.to_string(),
                callback_id: cb.id,
                message_id: message.message_id,
                data: cb.data.unwrap_or_default(),
            });
        }

        let message = self.message?;
        Some(InboundEvent::Message {
            chat_id: message.chat.id.to_string(),
            text: message.text?,
        })
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
