//! Pure state transition function
//!
//! Sequencing and type selection only. The text of questions and critiques
//! comes back from the tutor through events.

use super::{Effect, Event, QuestionType, WritingState};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: WritingState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: WritingState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("No question is waiting for an answer")]
    NoPendingQuestion,
    #[error("Tutor request already in progress")]
    Busy,
    #[error("Study context must not be empty")]
    EmptyContext,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs. The caller
/// picks the random rotation offset and passes it in the event.
pub fn transition(state: &WritingState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // New material (fresh start, or preempting a pending question)
        // ============================================================
        (WritingState::Drafting { .. } | WritingState::Evaluating { .. }, Event::SourceMaterial { .. }) => {
            Err(TransitionError::Busy)
        }

        (_, Event::SourceMaterial { context, .. }) if context.trim().is_empty() => {
            Err(TransitionError::EmptyContext)
        }

        (_, Event::SourceMaterial { context, offset }) => {
            let kind = QuestionType::cycle(offset);
            Ok(TransitionResult::new(WritingState::Drafting {
                context: context.clone(),
                kind,
                question_count: offset % 5 + 1,
            })
            .with_effect(Effect::GenerateQuestion { context, kind }))
        }

        // ============================================================
        // Question authoring
        // ============================================================
        (WritingState::Drafting { .. }, Event::QuestionReady { question })
            if question.trim().is_empty() =>
        {
            Err(TransitionError::InvalidTransition(
                "authored question is empty".to_string(),
            ))
        }

        (
            WritingState::Drafting {
                context,
                kind,
                question_count,
            },
            Event::QuestionReady { question },
        ) => Ok(TransitionResult::new(WritingState::QuestionIssued {
            context: context.clone(),
            question: question.clone(),
            kind: *kind,
            question_count: *question_count,
        })
        .with_effect(Effect::DeliverQuestion {
            kind: *kind,
            question,
        })),

        // The rotation has already advanced; "next question" retries with the following type
        (
            WritingState::Drafting {
                context,
                kind,
                question_count,
            },
            Event::QuestionFailed { notice },
        ) => Ok(TransitionResult::new(WritingState::Evaluated {
            context: context.clone(),
            question: String::new(),
            kind: *kind,
            question_count: *question_count,
        })
        .with_effect(Effect::notice_with_next(notice))),

        // ============================================================
        // Answers
        // ============================================================
        (
            WritingState::QuestionIssued {
                context,
                question,
                kind,
                question_count,
            },
            Event::Answer { text },
        ) => Ok(TransitionResult::new(WritingState::Evaluating {
            context: context.clone(),
            question: question.clone(),
            kind: *kind,
            question_count: *question_count,
        })
        .with_effect(Effect::EvaluateAnswer {
            context: context.clone(),
            kind: *kind,
            question: question.clone(),
            answer: text,
        })),

        (WritingState::Idle | WritingState::Evaluated { .. }, Event::Answer { .. }) => {
            Err(TransitionError::NoPendingQuestion)
        }

        (
            WritingState::Evaluating {
                context,
                question,
                kind,
                question_count,
            },
            Event::EvaluationReady { feedback },
        ) => Ok(TransitionResult::new(WritingState::Evaluated {
            context: context.clone(),
            question: question.clone(),
            kind: *kind,
            question_count: *question_count,
        })
        .with_effect(Effect::DeliverEvaluation { feedback })),

        // Answer stays pending so the learner can resend it
        (
            WritingState::Evaluating {
                context,
                question,
                kind,
                question_count,
            },
            Event::EvaluationFailed { notice },
        ) => Ok(TransitionResult::new(WritingState::QuestionIssued {
            context: context.clone(),
            question: question.clone(),
            kind: *kind,
            question_count: *question_count,
        })
        .with_effect(Effect::notice(notice))),

        // ============================================================
        // Next question
        // ============================================================
        (WritingState::Idle, Event::NextQuestion) => {
            Ok(TransitionResult::new(WritingState::Idle).with_effect(Effect::ReportNoMaterial))
        }

        // A pending question is abandoned without evaluation
        (
            WritingState::QuestionIssued {
                context,
                question_count,
                ..
            }
            | WritingState::Evaluated {
                context,
                question_count,
                ..
            },
            Event::NextQuestion,
        ) => {
            let kind = QuestionType::cycle(*question_count);
            Ok(TransitionResult::new(WritingState::Drafting {
                context: context.clone(),
                kind,
                question_count: question_count.saturating_add(1),
            })
            .with_effect(Effect::GenerateQuestion {
                context: context.clone(),
                kind,
            }))
        }

        (
            WritingState::Drafting { .. } | WritingState::Evaluating { .. },
            Event::Answer { .. } | Event::NextQuestion,
        ) => Err(TransitionError::Busy),

        // ============================================================
        // Tutor events outside their in-flight state
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} in state {}",
            event.name(),
            state.name()
        ))),
    }
}
