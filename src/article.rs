//! Article extraction from fetched web pages
//!
//! Regex-based and best-effort: the goal is readable study text, not a
//! faithful DOM. Malformed or nested markup can leak stray fragments.

use crate::config::Limits;
use crate::text;
use regex::{Captures, Regex};
use reqwest::{Client, Response, StatusCode};
use std::sync::LazyLock;
use thiserror::Error;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; LingoBot/1.0)";

static ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<article[\s>][\s\S]*?</article>").expect("valid regex"));
static MAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<main[\s>][\s\S]*?</main>").expect("valid regex"));

/// Blocks dropped together with their content, applied in this order
static BOILERPLATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["script", "style", "nav", "footer", "header"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?i)<{tag}[\s\S]*?</{tag}>")).expect("valid regex"))
        .collect()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:(nbsp|amp|lt|gt|quot|#39)|#[xX]([0-9a-fA-F]+)|#([0-9]+));")
        .expect("valid regex")
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {0}")]
    Status(StatusCode),
    #[error("No readable text in page")]
    Empty,
}

/// Plain study text pulled out of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub text: String,
    /// Set when the text was cut to the configured maximum
    pub truncated: bool,
}

/// First `<article>` block, else first `<main>` block, else the input
pub fn isolate_main_content(markup: &str) -> &str {
    ARTICLE_RE
        .find(markup)
        .or_else(|| MAIN_RE.find(markup))
        .map_or(markup, |m| m.as_str())
}

/// Strip markup down to single-spaced plain text
pub fn clean_markup(markup: &str) -> String {
    let mut text = markup.to_string();
    for re in BOILERPLATE_RES.iter() {
        text = re.replace_all(&text, "").into_owned();
    }
    let text = TAG_RE.replace_all(&text, " ");
    let text = ENTITY_RE.replace_all(&text, decode_entity);
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

fn decode_entity(caps: &Captures) -> String {
    if let Some(named) = caps.get(1) {
        return match named.as_str() {
            "nbsp" => " ",
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            _ => "'",
        }
        .to_string();
    }
    let code = match (caps.get(2), caps.get(3)) {
        (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
        (_, Some(dec)) => dec.as_str().parse().ok(),
        _ => None,
    };
    // Out-of-range code points are left as written
    code.and_then(char::from_u32)
        .map_or_else(|| caps[0].to_string(), String::from)
}

/// Turn raw page markup into study text, or `None` when nothing readable remains
pub fn extract_article(markup: &str, max_text_len: usize) -> Option<Article> {
    let text = clean_markup(isolate_main_content(markup));
    if text.is_empty() {
        return None;
    }
    let truncated = text.chars().count() > max_text_len;
    let text = if truncated {
        text::truncate(&text, max_text_len)
    } else {
        text
    };
    Some(Article { text, truncated })
}

// ============================================================================
// HTTP fetching
// ============================================================================

/// Downloads pages with a byte budget and a request timeout
#[derive(Debug, Clone)]
pub struct HttpArticleFetcher {
    client: Client,
    max_bytes: usize,
    max_text_len: usize,
}

impl HttpArticleFetcher {
    pub fn new(limits: &Limits) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(limits.fetch_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            max_bytes: limits.max_html_bytes,
            max_text_len: limits.max_text_len,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<Article, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = read_limited(response, self.max_bytes)
            .await
            .map_err(reqwest::Error::without_url)?;
        let markup = String::from_utf8_lossy(&body);
        tracing::debug!(url, bytes = body.len(), "Fetched article markup");
        extract_article(&markup, self.max_text_len).ok_or(FetchError::Empty)
    }
}

/// Read at most `max_bytes` of the body, dropping the rest of the stream
async fn read_limited(mut response: Response, max_bytes: usize) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::new();
    while body.len() < max_bytes {
        let Some(chunk) = response.chunk().await? else {
            break;
        };
        let take = chunk.len().min(max_bytes - body.len());
        body.extend_from_slice(&chunk[..take]);
    }
    Ok(body)
}
