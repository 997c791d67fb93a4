//! Telegram Bot API transport
//!
//! Long replies go out as several messages. Each piece is cut at a paragraph,
//! line or word boundary and numbered `(i/total)`; only the last piece carries
//! the inline keyboard.

use crate::config::Limits;
use crate::text;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error {status}: {body}")]
    Api { status: u16, body: String },
}

// ============================================================================
// Inline keyboards and actions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

/// `reply_markup` payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Thumbs up/down under a tutoring reply, keyed by its trace id
    pub fn feedback(trace_id: &str) -> Self {
        Self {
            inline_keyboard: vec![vec![
                InlineButton {
                    text: "👍 도움됐어요".to_string(),
                    callback_data: format!("good:{trace_id}"),
                },
                InlineButton {
                    text: "👎 아쉬워요".to_string(),
                    callback_data: format!("bad:{trace_id}"),
                },
            ]],
        }
    }

    pub fn next_question() -> Self {
        Self {
            inline_keyboard: vec![vec![InlineButton {
                text: "✍️ 다음 문제".to_string(),
                callback_data: "next_writing".to_string(),
            }]],
        }
    }
}

/// Decoded `callback_data` of a pressed button (`tag` or `tag:correlation`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Feedback { positive: bool, trace_id: String },
    NextQuestion,
    Unknown(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        let (tag, correlation) = data.split_once(':').unwrap_or((data, ""));
        match tag {
            "good" | "bad" => CallbackAction::Feedback {
                positive: tag == "good",
                trace_id: correlation.to_string(),
            },
            "next_writing" => CallbackAction::NextQuestion,
            _ => CallbackAction::Unknown(data.to_string()),
        }
    }
}

// ============================================================================
// Message splitting
// ============================================================================

/// Split `text` into deliverable pieces
///
/// Pieces are sized by `safe_len`, numbered when there is more than one, and
/// hard-capped at `max_len` characters after numbering.
pub fn delivery_pieces(text: &str, safe_len: usize, max_len: usize) -> Vec<String> {
    let chunks = text::chunk(text, safe_len);
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let piece = if total > 1 {
                format!("({}/{total})\n{chunk}", i + 1)
            } else {
                chunk
            };
            if piece.chars().count() > max_len {
                piece.chars().take(max_len).collect()
            } else {
                piece
            }
        })
        .collect()
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    safe_len: usize,
    max_len: usize,
}

impl TelegramClient {
    pub fn new(token: &str, limits: &Limits) -> Result<Self, TransportError> {
        Self::with_api_base(token, limits, DEFAULT_API_BASE)
    }

    pub fn with_api_base(token: &str, limits: &Limits, api_base: &str) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_base.trim_end_matches('/')),
            safe_len: limits.transport_safe_len,
            max_len: limits.transport_max_len,
        })
    }

    /// Send `text`, split as needed. Stops at the first piece that fails.
    pub async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        let pieces = delivery_pieces(text, self.safe_len, self.max_len);
        let total = pieces.len();

        for (i, piece) in pieces.into_iter().enumerate() {
            let mut body = json!({ "chat_id": chat_id, "text": piece });
            if let Some(keyboard) = keyboard.filter(|_| i + 1 == total) {
                body["reply_markup"] = json!(keyboard);
            }
            if let Err(e) = self.call("sendMessage", &body).await {
                tracing::error!(chat_id, piece = i + 1, total, error = %e, "Failed to deliver message piece");
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), TransportError> {
        self.call(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_id, "text": text }),
        )
        .await
    }

    /// Remove the inline keyboard from an earlier message
    pub async fn clear_keyboard(&self, chat_id: &str, message_id: i64) -> Result<(), TransportError> {
        self.call(
            "editMessageReplyMarkup",
            &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "reply_markup": InlineKeyboard::default(),
            }),
        )
        .await
    }

    async fn call(&self, method: &str, body: &Value) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await
            // The URL embeds the bot token
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_callback_action_parse() {
        assert_eq!(
            CallbackAction::parse("good:abc-123"),
            CallbackAction::Feedback {
                positive: true,
                trace_id: "abc-123".into()
            }
        );
        assert_eq!(
            CallbackAction::parse("bad:x:y"),
            CallbackAction::Feedback {
                positive: false,
                trace_id: "x:y".into()
            }
        );
        assert_eq!(CallbackAction::parse("next_writing"), CallbackAction::NextQuestion);
        assert_eq!(
            CallbackAction::parse("other:1"),
            CallbackAction::Unknown("other:1".into())
        );
    }

    #[test]
    fn test_keyboards_serialize_as_reply_markup() {
        let value = serde_json::to_value(InlineKeyboard::feedback("t1")).unwrap();
        assert_eq!(value["inline_keyboard"][0][0]["callback_data"], "good:t1");
        assert_eq!(value["inline_keyboard"][0][1]["callback_data"], "bad:t1");

        let value = serde_json::to_value(InlineKeyboard::next_question()).unwrap();
        assert_eq!(value["inline_keyboard"][0][0]["callback_data"], "next_writing");

        let value = serde_json::to_value(InlineKeyboard::default()).unwrap();
        assert_eq!(value, json!({"inline_keyboard": []}));
    }

    #[test]
    fn test_single_piece_has_no_prefix() {
        assert_eq!(delivery_pieces("short", 100, 120), vec!["short"]);
    }

    #[test]
    fn test_pieces_are_numbered_and_capped() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let pieces = delivery_pieces(text, 20, 24);
        assert!(pieces.len() > 1);
        let total = pieces.len();
        for (i, piece) in pieces.iter().enumerate() {
            assert!(piece.starts_with(&format!("({}/{total})\n", i + 1)));
            assert!(piece.chars().count() <= 24);
        }
    }

    #[derive(Clone, Default)]
    struct Recorded {
        bodies: Arc<Mutex<Vec<Value>>>,
        fail_on: Option<usize>,
    }

    async fn record(State(rec): State<Recorded>, Json(body): Json<Value>) -> StatusCode {
        let mut bodies = rec.bodies.lock().unwrap();
        bodies.push(body);
        if rec.fail_on == Some(bodies.len()) {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::OK
        }
    }

    async fn client_for(rec: Recorded, limits: &Limits) -> TelegramClient {
        let router = Router::new()
            .route("/bottok/sendMessage", post(record))
            .route("/bottok/answerCallbackQuery", post(record))
            .route("/bottok/editMessageReplyMarkup", post(record))
            .with_state(rec);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        TelegramClient::with_api_base("tok", limits, &format!("http://{addr}")).unwrap()
    }

    fn tiny_limits() -> Limits {
        Limits {
            transport_safe_len: 20,
            transport_max_len: 30,
            ..Limits::default()
        }
    }

    #[tokio::test]
    async fn test_keyboard_only_on_last_piece() {
        let rec = Recorded::default();
        let client = client_for(rec.clone(), &tiny_limits()).await;

        let text = "one two three four five six seven eight nine ten";
        client
            .send_text("42", text, Some(&InlineKeyboard::next_question()))
            .await
            .unwrap();

        let bodies = rec.bodies.lock().unwrap().clone();
        assert!(bodies.len() > 1);
        for body in &bodies[..bodies.len() - 1] {
            assert!(body.get("reply_markup").is_none());
            assert_eq!(body["chat_id"], "42");
        }
        assert_eq!(
            bodies.last().unwrap()["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "next_writing"
        );
    }

    #[tokio::test]
    async fn test_failed_piece_stops_delivery() {
        let rec = Recorded {
            fail_on: Some(1),
            ..Recorded::default()
        };
        let client = client_for(rec.clone(), &tiny_limits()).await;

        let text = "one two three four five six seven eight nine ten";
        let err = client.send_text("42", text, None).await.unwrap_err();
        assert!(matches!(err, TransportError::Api { status: 400, .. }));
        assert_eq!(rec.bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_callback_and_keyboard_removal() {
        let rec = Recorded::default();
        let client = client_for(rec.clone(), &tiny_limits()).await;

        client.answer_callback("cb-1", "thanks").await.unwrap();
        client.clear_keyboard("42", 7).await.unwrap();

        let bodies = rec.bodies.lock().unwrap().clone();
        assert_eq!(bodies[0], json!({"callback_query_id": "cb-1", "text": "thanks"}));
        assert_eq!(bodies[1]["message_id"], 7);
        assert_eq!(bodies[1]["reply_markup"], json!({"inline_keyboard": []}));
    }

    #[tokio::test]
    async fn test_network_error_hides_token() {
        let client =
            TelegramClient::with_api_base("123:SECRET_TOKEN", &tiny_limits(), "http://127.0.0.1:1").unwrap();
        let err = client.send_text("42", "hello", None).await.unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
        assert!(!err.to_string().contains("SECRET_TOKEN"));
        assert!(!format!("{err:?}").contains("SECRET_TOKEN"));
    }
}
