//! Inbound message classification

use regex::Regex;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://\S+$").expect("valid url regex"));

const MIN_STUDY_LEN: usize = 12;
const MIN_LATIN_LETTERS: usize = 8;

/// Reserved command tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Drop the whole session
    Reset,
    /// Send the usage text
    Help,
}

impl Command {
    /// Exact token match; surrounding whitespace makes it ordinary text
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "/clear" | "/reset" => Some(Command::Reset),
            "/start" | "/help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// What an inbound message is, before session context is considered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Command(Command),
    Url(String),
    StudyText,
    /// A follow-up question or, while a question is pending, an answer
    FollowUp,
}

impl InputKind {
    /// Whether this input starts a new writing cycle once resolved
    pub fn is_source_material(&self) -> bool {
        matches!(self, InputKind::Url(_) | InputKind::StudyText)
    }
}

pub fn classify(text: &str) -> InputKind {
    if let Some(cmd) = Command::parse(text) {
        return InputKind::Command(cmd);
    }
    if is_url(text) {
        return InputKind::Url(text.trim().to_string());
    }
    if is_likely_study_text(text) {
        return InputKind::StudyText;
    }
    InputKind::FollowUp
}

/// Whole-string `http(s)://` match with no surrounding prose
pub fn is_url(text: &str) -> bool {
    URL_RE.is_match(text.trim())
}

/// Language-ratio gate: enough Latin letters, and at least twice as many as
/// Hangul syllables
pub fn is_likely_study_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_STUDY_LEN {
        return false;
    }
    let latin = trimmed.chars().filter(char::is_ascii_alphabetic).count();
    let hangul = trimmed.chars().filter(|c| ('가'..='힣').contains(c)).count();
    latin >= MIN_LATIN_LETTERS && latin >= hangul * 2
}
