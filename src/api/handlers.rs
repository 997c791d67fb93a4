//! HTTP request handlers

use super::types::{ErrorResponse, Update};
use super::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ok))
        .route("/health", get(ok))
        // Telegram only POSTs; anything else is a probe
        .route("/webhook", get(ok).post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ok() -> &'static str {
    "OK"
}

// ============================================================
// Webhook
// ============================================================

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    if state.webhook_secret.is_empty() {
        return Err(AppError::Internal("Webhook secret is not configured".into()));
    }
    let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if presented != Some(&*state.webhook_secret) {
        tracing::warn!("Rejected webhook call with a missing or wrong secret token");
        return Err(AppError::Forbidden("Forbidden".into()));
    }

    let update: Update = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed update: {e}")))?;
    let Some(event) = update.into_event() else {
        return Ok("OK");
    };

    // Always 200 once processed; Telegram redelivers anything else
    if let Err(e) = state.runtime.handle(event).await {
        tracing::error!(error = %e, "Failed to process update");
    }
    Ok("OK")
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Prompts};
    use crate::runtime::testing::{
        MemoryStore, MockLlmClient, Outbound, RecordingMessenger, RecordingTelemetry,
        StaticArticleFetcher,
    };
    use crate::runtime::StudyRuntime;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(secret: &str) -> (Router, Arc<RecordingMessenger>) {
        let config = Config::for_tests();
        let messenger = Arc::new(RecordingMessenger::default());
        let runtime = StudyRuntime::new(
            &config,
            MemoryStore::new(config.limits.max_history()),
            MockLlmClient::new("mock"),
            StaticArticleFetcher::default(),
            messenger.clone(),
            RecordingTelemetry::default(),
        );
        let state = AppState::new(Arc::new(runtime), secret);
        (create_router(state), messenger)
    }

    fn update(secret: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    const START: &str = r#"{"update_id":1,"message":{"message_id":1,"chat":{"id":7},"text":"/start"}}"#;

    #[tokio::test]
    async fn test_health_and_root() {
        let (router, _) = app("s3cret");
        for uri in ["/", "/health", "/webhook"] {
            let response = router
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_secret_is_required() {
        let (router, messenger) = app("s3cret");

        let response = router.clone().oneshot(update(None, START)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router.oneshot(update(Some("wrong"), START)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(messenger.outbound().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_secret_is_server_error() {
        let (router, _) = app("");
        let response = router.oneshot(update(Some(""), START)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_update_is_dispatched() {
        let (router, messenger) = app("s3cret");
        let response = router.oneshot(update(Some("s3cret"), START)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            messenger.outbound(),
            vec![Outbound::Text {
                chat_id: "7".into(),
                text: Prompts::default().usage,
                keyboard: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_malformed_update_is_rejected() {
        let (router, _) = app("s3cret");
        let response = router.oneshot(update(Some("s3cret"), "{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_detached_callback_stops_spinner() {
        let (router, messenger) = app("s3cret");
        let body = r#"{"update_id":4,"callback_query":{"id":"cb-7","data":"next_writing"}}"#;
        let response = router.oneshot(update(Some("s3cret"), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            messenger.outbound(),
            vec![Outbound::CallbackAnswer {
                callback_id: "cb-7".into(),
                text: Prompts::default().expired_action,
            }]
        );
    }

    #[tokio::test]
    async fn test_non_text_update_is_acknowledged() {
        let (router, messenger) = app("s3cret");
        let body = r#"{"update_id":2,"message":{"message_id":3,"chat":{"id":7},"photo":[]}}"#;
        let response = router.oneshot(update(Some("s3cret"), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(messenger.outbound().is_empty());
    }
}
