//! Writing practice state types

use crate::db::WritingRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Question Types
// ============================================================================

/// Focus of a writing question
///
/// Serialized with the Korean labels shown to learners so stored sessions
/// stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "단어")]
    Vocabulary,
    #[serde(rename = "구문")]
    Phrase,
    #[serde(rename = "패턴")]
    Pattern,
    #[serde(rename = "변환")]
    Transformation,
    #[serde(rename = "빈칸")]
    FillBlank,
}

impl QuestionType {
    /// Fixed rotation order
    pub const CYCLE: [QuestionType; 5] = [
        QuestionType::Vocabulary,
        QuestionType::Phrase,
        QuestionType::Pattern,
        QuestionType::Transformation,
        QuestionType::FillBlank,
    ];

    /// Type at position `index` of the endless rotation
    pub fn cycle(index: u32) -> Self {
        Self::CYCLE[index as usize % Self::CYCLE.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            QuestionType::Vocabulary => "단어",
            QuestionType::Phrase => "구문",
            QuestionType::Pattern => "패턴",
            QuestionType::Transformation => "변환",
            QuestionType::FillBlank => "빈칸",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Writing State
// ============================================================================

/// Per-session writing practice state
///
/// `Drafting` and `Evaluating` only exist while the tutor is working on a
/// request; they never outlive the event that entered them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WritingState {
    /// No study material yet
    #[default]
    Idle,

    /// Waiting for the tutor to author a question
    Drafting {
        context: String,
        kind: QuestionType,
        question_count: u32,
    },

    /// A question is out and the next plain message is its answer
    QuestionIssued {
        context: String,
        question: String,
        kind: QuestionType,
        question_count: u32,
    },

    /// Waiting for the tutor to critique an answer
    Evaluating {
        context: String,
        question: String,
        kind: QuestionType,
        question_count: u32,
    },

    /// Answer evaluated; context kept for the next question
    Evaluated {
        context: String,
        question: String,
        kind: QuestionType,
        question_count: u32,
    },
}

impl WritingState {
    pub fn is_awaiting_answer(&self) -> bool {
        matches!(
            self,
            WritingState::QuestionIssued { .. } | WritingState::Evaluating { .. }
        )
    }

    pub fn question_count(&self) -> Option<u32> {
        match self {
            WritingState::Idle => None,
            WritingState::Drafting { question_count, .. }
            | WritingState::QuestionIssued { question_count, .. }
            | WritingState::Evaluating { question_count, .. }
            | WritingState::Evaluated { question_count, .. } => Some(*question_count),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            WritingState::Idle => "idle",
            WritingState::Drafting { .. } => "drafting",
            WritingState::QuestionIssued { .. } => "question_issued",
            WritingState::Evaluating { .. } => "evaluating",
            WritingState::Evaluated { .. } => "evaluated",
        }
    }

    /// Abandon a pending question without evaluating it
    pub fn set_aside(self) -> Self {
        match self {
            WritingState::QuestionIssued {
                context,
                question,
                kind,
                question_count,
            } => WritingState::Evaluated {
                context,
                question,
                kind,
                question_count,
            },
            other => other,
        }
    }

    /// Persisted form; in-flight states collapse to the settled state they
    /// came from
    pub fn to_record(&self) -> Option<WritingRecord> {
        let (context, question, kind, question_count, awaiting_answer) = match self {
            WritingState::Idle => return None,
            WritingState::Drafting {
                context,
                kind,
                question_count,
            } => (context, "", kind, question_count, false),
            WritingState::QuestionIssued {
                context,
                question,
                kind,
                question_count,
            }
            | WritingState::Evaluating {
                context,
                question,
                kind,
                question_count,
            } => (context, question.as_str(), kind, question_count, true),
            WritingState::Evaluated {
                context,
                question,
                kind,
                question_count,
            } => (context, question.as_str(), kind, question_count, false),
        };
        Some(WritingRecord {
            context: context.clone(),
            question: question.to_string(),
            kind: *kind,
            awaiting_answer,
            question_count: *question_count,
        })
    }

    pub fn from_record(record: Option<WritingRecord>) -> Self {
        let Some(r) = record else {
            return WritingState::Idle;
        };
        if r.awaiting_answer {
            WritingState::QuestionIssued {
                context: r.context,
                question: r.question,
                kind: r.kind,
                question_count: r.question_count,
            }
        } else {
            WritingState::Evaluated {
                context: r.context,
                question: r.question,
                kind: r.kind,
                question_count: r.question_count,
            }
        }
    }
}
