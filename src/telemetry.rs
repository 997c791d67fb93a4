//! Langfuse-compatible telemetry
//!
//! Every tutoring reply becomes one trace plus one generation, and feedback
//! buttons become scores. Delivery is best-effort: failures are logged and
//! never reach the learner.

use crate::config::LangfuseConfig;
use crate::llm::Usage;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Name of the managed tutor instruction
pub const SYSTEM_PROMPT_NAME: &str = "system-prompt";

const PROMPT_CACHE_TTL: Duration = Duration::from_secs(300);
/// A missing or unreachable prompt is retried after this long
const PROMPT_RETRY_AFTER: Duration = Duration::from_secs(30);
/// The override fetch sits in front of every tutoring turn
const PROMPT_TIMEOUT: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telemetry endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid telemetry URL: {0}")]
    Url(String),
}

/// Managed instruction that replaces the built-in tutor prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOverride {
    pub prompt: String,
    pub version: Option<i64>,
}

/// One tutoring exchange, as reported to telemetry
#[derive(Debug, Clone)]
pub struct TurnTrace {
    pub trace_id: String,
    pub chat_id: String,
    pub input: String,
    pub output: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub prompt: Option<PromptOverride>,
}

// ============================================================================
// Payloads
// ============================================================================

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ingestion batch with a `trace-create` and a linked `generation-create`
pub fn build_ingestion_payload(trace: &TurnTrace) -> Value {
    let start = iso(trace.started_at);

    let mut generation = json!({
        "id": event_id(),
        "traceId": trace.trace_id,
        "name": "gemini",
        "startTime": start,
        "endTime": iso(trace.ended_at),
        "model": trace.model,
        "input": trace.input,
        "output": trace.output,
    });
    if let Some(usage) = trace.usage {
        generation["usageDetails"] = json!({
            "input": usage.input_tokens,
            "output": usage.output_tokens,
            "total": usage.total_tokens,
        });
    }
    if let Some(prompt) = &trace.prompt {
        generation["promptName"] = json!(SYSTEM_PROMPT_NAME);
        generation["promptVersion"] = json!(prompt.version);
    }

    json!({
        "batch": [
            {
                "id": event_id(),
                "timestamp": start,
                "type": "trace-create",
                "body": {
                    "id": trace.trace_id,
                    "timestamp": start,
                    "name": "chat",
                    "userId": trace.chat_id,
                    "input": trace.input,
                    "output": trace.output,
                },
            },
            {
                "id": event_id(),
                "timestamp": start,
                "type": "generation-create",
                "body": generation,
            },
        ]
    })
}

/// Ingestion batch holding one learner feedback score (1 helpful, 0 not)
pub fn build_score_payload(trace_id: &str, value: u8) -> Value {
    json!({
        "batch": [{
            "id": event_id(),
            "timestamp": iso(Utc::now()),
            "type": "score-create",
            "body": {
                "id": event_id(),
                "traceId": trace_id,
                "name": "user-feedback",
                "value": value,
                "dataType": "NUMERIC",
            },
        }]
    })
}

// ============================================================================
// Client
// ============================================================================

#[derive(Deserialize)]
struct PromptResponse {
    prompt: Value,
    #[serde(default)]
    version: Option<i64>,
}

#[derive(Clone)]
pub struct LangfuseClient {
    client: Client,
    base_url: String,
    authorization: String,
    prompt_cache: Arc<Mutex<HashMap<String, (Instant, Option<PromptOverride>)>>>,
}

impl LangfuseClient {
    pub fn new(config: &LangfuseConfig) -> Result<Self, TelemetryError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let credentials = STANDARD.encode(format!("{}:{}", config.public_key, config.secret_key));
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization: format!("Basic {credentials}"),
            prompt_cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub async fn send(&self, payload: &Value) -> Result<(), TelemetryError> {
        let response = self
            .client
            .post(format!("{}/api/public/ingestion", self.base_url))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Submit without waiting; failures are only logged
    pub fn dispatch(&self, payload: Value) {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send(&payload).await {
                tracing::warn!(error = %e, "Telemetry ingestion failed");
            }
        });
    }

    /// Production-labelled text prompt, cached for five minutes
    ///
    /// Misses are cached too, for a shorter time, so an unreachable endpoint
    /// costs at most one bounded wait per retry window.
    pub async fn fetch_prompt(&self, name: &str) -> Option<PromptOverride> {
        if let Ok(cache) = self.prompt_cache.lock() {
            if let Some((fetched_at, prompt)) = cache.get(name) {
                let ttl = if prompt.is_some() {
                    PROMPT_CACHE_TTL
                } else {
                    PROMPT_RETRY_AFTER
                };
                if fetched_at.elapsed() < ttl {
                    return prompt.clone();
                }
            }
        }

        let prompt = match self.request_prompt(name).await {
            Ok(Some(prompt)) => Some(prompt),
            Ok(None) => {
                tracing::warn!(prompt = name, "Managed prompt is not a text prompt");
                None
            }
            Err(e) => {
                tracing::warn!(prompt = name, error = %e, "Managed prompt fetch failed");
                None
            }
        };
        if let Ok(mut cache) = self.prompt_cache.lock() {
            cache.insert(name.to_string(), (Instant::now(), prompt.clone()));
        }
        prompt
    }

    async fn request_prompt(&self, name: &str) -> Result<Option<PromptOverride>, TelemetryError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| TelemetryError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| TelemetryError::Url(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["api", "public", "v2", "prompts", name]);
        url.query_pairs_mut().append_pair("label", "production");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .timeout(PROMPT_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: PromptResponse = response.json().await?;
        Ok(match body.prompt {
            Value::String(prompt) => Some(PromptOverride {
                prompt,
                version: body.version,
            }),
            _ => None,
        })
    }
}
