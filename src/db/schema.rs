//! Database schema and session record types

use crate::state_machine::{QuestionType, WritingState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    chat_id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
";

// ============================================================
// Persisted shapes
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One dialogue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Stored writing practice fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingRecord {
    pub context: String,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub awaiting_answer: bool,
    pub question_count: u32,
}

impl WritingRecord {
    /// A pending question needs both the material and the question text
    pub fn is_consistent(&self) -> bool {
        !self.awaiting_answer || (!self.context.is_empty() && !self.question.is_empty())
    }
}

/// Serialized session: `{ history, writing }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub history: Vec<Turn>,
    pub writing: Option<WritingRecord>,
}

impl SessionRecord {
    /// Parse a stored payload, treating anything malformed as an empty session
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str::<Value>(raw).map_or_else(|_| Self::default(), Self::from_value)
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            // Early payloads stored only the history array
            Value::Array(_) => Self {
                history: parse_history(value),
                writing: None,
            },
            Value::Object(mut map) => Self {
                history: map.remove("history").map(parse_history).unwrap_or_default(),
                writing: map.remove("writing").and_then(parse_writing),
            },
            _ => Self::default(),
        }
    }
}

fn parse_history(value: Value) -> Vec<Turn> {
    serde_json::from_value(value).unwrap_or_default()
}

fn parse_writing(value: Value) -> Option<WritingRecord> {
    serde_json::from_value::<WritingRecord>(value)
        .ok()
        .filter(WritingRecord::is_consistent)
}

// ============================================================
// In-memory session
// ============================================================

/// A conversation's working state while an event is processed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub history: Vec<Turn>,
    pub writing: WritingState,
}

impl Session {
    pub fn from_record(record: SessionRecord) -> Self {
        Self {
            history: record.history,
            writing: WritingState::from_record(record.writing),
        }
    }

    /// Persisted form keeping only the newest `max_history` turns
    pub fn to_record(&self, max_history: usize) -> SessionRecord {
        let skip = self.history.len().saturating_sub(max_history);
        SessionRecord {
            history: self.history[skip..].to_vec(),
            writing: self.writing.to_record(),
        }
    }
}
