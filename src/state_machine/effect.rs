//! Effects produced by state transitions

use super::state::QuestionType;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the tutor for a question of `kind` grounded in `context`
    GenerateQuestion { context: String, kind: QuestionType },

    /// Ask the tutor to critique `answer`
    EvaluateAnswer {
        context: String,
        kind: QuestionType,
        question: String,
        answer: String,
    },

    /// Send a freshly authored question to the learner
    DeliverQuestion { kind: QuestionType, question: String },

    /// Send the critique together with the "next question" action
    DeliverEvaluation { feedback: String },

    /// Send a fixed notice; `offer_next` attaches the "next question" action
    DeliverNotice { text: String, offer_next: bool },

    /// "Next question" was requested before any material was sent
    ReportNoMaterial,
}

impl Effect {
    pub fn notice(text: impl Into<String>) -> Self {
        Effect::DeliverNotice {
            text: text.into(),
            offer_next: false,
        }
    }

    pub fn notice_with_next(text: impl Into<String>) -> Self {
        Effect::DeliverNotice {
            text: text.into(),
            offer_next: true,
        }
    }
}
