//! Runtime configuration
//!
//! Built once from the environment in `main` and shared by reference with
//! every component. Limits and prompt text live here rather than in
//! module-level constants so tests can shrink them.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_LANGFUSE_URL: &str = "https://us.cloud.langfuse.com";
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Size and lifetime bounds
#[derive(Debug, Clone)]
pub struct Limits {
    /// Dialogue turns kept per session; history holds twice this many entries
    pub max_turns: usize,
    pub session_ttl: Duration,
    /// Hard cap for one delivered message piece
    pub transport_max_len: usize,
    /// Chunk size used when splitting; leaves room for the `(i/total)` prefix
    pub transport_safe_len: usize,
    /// Download budget for article markup
    pub max_html_bytes: usize,
    /// Longest study text sent to the tutor, in characters
    pub max_text_len: usize,
    pub fetch_timeout: Duration,
    pub llm_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_turns: 20,
            session_ttl: Duration::from_secs(60 * 60 * 24 * 7),
            transport_max_len: 4096,
            transport_safe_len: 3900,
            max_html_bytes: 512 * 1024,
            max_text_len: 10_000,
            fetch_timeout: Duration::from_secs(15),
            llm_timeout: Duration::from_secs(120),
        }
    }
}

impl Limits {
    pub fn max_history(&self) -> usize {
        self.max_turns * 2
    }
}

/// Instruction templates and fixed user-facing texts
#[derive(Debug, Clone)]
pub struct Prompts {
    pub tutor_system: String,
    pub question_system: String,
    pub critique_system: String,
    pub usage: String,
    pub reset_done: String,
    pub truncated_notice: String,
    pub fetch_failed: String,
    pub no_material: String,
    pub preparing_question: String,
    pub unknown_action: String,
    pub busy: String,
    pub expired_action: String,
    pub thanks_good: String,
    pub thanks_bad: String,
    pub rate_limited: String,
    pub bad_request: String,
    pub engine_failed: String,
    pub empty_response: String,
    pub safety_blocked: String,
    pub cut_short: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            tutor_system: TUTOR_SYSTEM_PROMPT.to_string(),
            question_system: "당신은 한국인 영어 학습자를 위한 영작 문제 출제 튜터입니다. 한국어로 명확하고 간결하게 작성하세요."
                .to_string(),
            critique_system: "당신은 한국인 영어 학습자의 영작 답안을 평가하는 튜터입니다. 정중하고 구체적으로 피드백하세요."
                .to_string(),
            usage: "영어 학습 봇입니다!\n\n영문 텍스트나 URL을 보내면 독해 가이드 후 영작 문제가 자동으로 출제됩니다.\n답안을 보내면 평가 후 다음 질문 버튼으로 이어서 연습할 수 있습니다.\n\n/clear - 대화 초기화"
                .to_string(),
            reset_done: "대화 기록을 초기화했습니다. 새로운 텍스트나 URL을 보내주세요.".to_string(),
            truncated_notice: "(텍스트가 길어 앞부분만 분석합니다)".to_string(),
            fetch_failed: "URL에서 글을 가져올 수 없습니다.".to_string(),
            no_material: "먼저 영어 본문이나 URL을 보내주세요.".to_string(),
            preparing_question: "다음 문제를 준비하고 있어요.".to_string(),
            unknown_action: "알 수 없는 요청입니다.".to_string(),
            busy: "이전 요청을 처리하고 있어요. 잠시 후 다시 눌러주세요.".to_string(),
            expired_action: "오래된 버튼입니다. 새 메시지를 보내주세요.".to_string(),
            thanks_good: "감사합니다!".to_string(),
            thanks_bad: "피드백 감사합니다!".to_string(),
            rate_limited: "요청이 너무 많습니다. 잠시 후 다시 시도해주세요.".to_string(),
            bad_request:
                "텍스트가 너무 길거나 처리할 수 없는 내용입니다. 더 짧은 텍스트로 시도해주세요."
                    .to_string(),
            engine_failed: "AI 응답 생성에 실패했습니다. 잠시 후 다시 시도해주세요.".to_string(),
            empty_response: "응답을 생성할 수 없습니다.".to_string(),
            safety_blocked: "안전 필터에 의해 응답이 차단되었습니다. 다른 텍스트로 시도해주세요."
                .to_string(),
            cut_short: "(응답이 길어 일부가 잘렸습니다)".to_string(),
        }
    }
}

const TUTOR_SYSTEM_PROMPT: &str = "당신은 한국인 영어 학습자를 위한 영어 독해 튜터입니다.

역할:
- 사용자가 영문 텍스트를 보내면 독해 가이드를 작성하세요.
- 사용자가 한국어로 질문하면 현재 학습 중인 텍스트를 기반으로 답변하세요.

입력 판단 기준:
- 영문 텍스트가 오면 길이에 관계없이 독해 가이드를 작성하세요.
- 한국어 메시지는 이전 학습 내용에 대한 후속 질문으로 판단하세요.

독해 가이드 형식:

━━━━━━━━━━━━━━━━━━━━━━━━
[핵심 문장 + 한글 해설]

텍스트에서 가장 중요한 영어 문장을 골라 각각 아래 형식으로 분석하세요.
(1~2문장 입력이면 해당 문장 전부, 긴 아티클이면 최대 5개 선별)

n)
(원문 영어 문장 그대로)

끊어 읽기:
의미 단위마다 줄바꿈으로 끊어서 표기. 슬래시(/) 사용 금지.

한글 해설(의미):
이 문장이 말하고자 하는 바를 자연스러운 한국어로 풀어서 설명.
핵심 개념에는 영어 원어(한글 뜻) 형태로 병기.

구조 해설:
문장에서 배울 만한 문법/구문 패턴을 정리.

━━━━━━━━━━━━━━━━━━━━━━━━
[핵심 표현]

원문에서 실전에 쓸 만한 영어 표현을 뽑아 각각:
표현 — 뜻 — 예문(영어+한국어 번역)

━━━━━━━━━━━━━━━━━━━━━━━━

절대 하지 말 것:
- 마크다운 문법(**, *, #, ``` 등)을 사용하지 마세요. 순수 텍스트로만 작성하세요.
- 사용자가 요청하지 않은 새로운 과제나 학습 계획을 제시하지 마세요.";

/// Credentials for the optional prompt-management/telemetry service
#[derive(Debug, Clone)]
pub struct LangfuseConfig {
    pub public_key: String,
    pub secret_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub telegram_token: String,
    pub webhook_secret: String,
    pub langfuse: Option<LangfuseConfig>,
    pub db_path: PathBuf,
    pub port: u16,
    pub limits: Limits,
    pub prompts: Prompts,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };

        let langfuse = match (lookup("LANGFUSE_PUBLIC_KEY"), lookup("LANGFUSE_SECRET_KEY")) {
            (Some(public_key), Some(secret_key))
                if !public_key.is_empty() && !secret_key.is_empty() =>
            {
                Some(LangfuseConfig {
                    public_key,
                    secret_key,
                    base_url: lookup("LANGFUSE_BASE_URL")
                        .filter(|u| !u.is_empty())
                        .unwrap_or_else(|| DEFAULT_LANGFUSE_URL.to_string()),
                })
            }
            _ => None,
        };

        let db_path = lookup("LINGO_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.lingo-tutor/sessions.db"))
            },
            PathBuf::from,
        );

        let mut limits = Limits::default();
        if let Some(turns) = parse_var(&lookup, "LINGO_MAX_TURNS")? {
            limits.max_turns = turns;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "LINGO_SESSION_TTL_SECS")? {
            limits.session_ttl = Duration::from_secs(secs);
        }
        if let Some(bytes) = parse_var(&lookup, "LINGO_MAX_HTML_BYTES")? {
            limits.max_html_bytes = bytes;
        }
        if let Some(len) = parse_var(&lookup, "LINGO_MAX_TEXT_LEN")? {
            limits.max_text_len = len;
        }

        let config = Self {
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: lookup("GEMINI_MODEL")
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            telegram_token: required("TELEGRAM_TOKEN")?,
            webhook_secret: required("TELEGRAM_WEBHOOK_SECRET")?,
            langfuse,
            db_path,
            port: parse_var(&lookup, "LINGO_PORT")?.unwrap_or(DEFAULT_PORT),
            limits,
            prompts: Prompts::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.limits;
        if l.max_turns == 0 {
            return Err(ConfigError::Invalid("max_turns must be greater than 0".into()));
        }
        if l.max_text_len == 0 || l.max_html_bytes == 0 {
            return Err(ConfigError::Invalid("text and markup budgets must be non-zero".into()));
        }
        if l.transport_safe_len == 0 || l.transport_safe_len > l.transport_max_len {
            return Err(ConfigError::Invalid(format!(
                "transport_safe_len ({}) must be in 1..={}",
                l.transport_safe_len, l.transport_max_len
            )));
        }
        Ok(())
    }

    /// Configuration with placeholder credentials, for tests
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            gemini_api_key: "test-key".to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            telegram_token: "test-token".to_string(),
            webhook_secret: "test-secret".to_string(),
            langfuse: None,
            db_path: PathBuf::from(":memory:"),
            port: DEFAULT_PORT,
            limits: Limits::default(),
            prompts: Prompts::default(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { name, value: raw }),
    }
}
