//! Events that drive the writing practice cycle

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Learner events
    /// New study material was analysed; `context` is the tutor's explanation
    SourceMaterial {
        context: String,
        /// Starting position in the question type rotation
        offset: u32,
    },
    /// Plain message received while a question may be pending
    Answer { text: String },
    /// "Next question" action
    NextQuestion,

    // Tutor events
    QuestionReady { question: String },
    QuestionFailed { notice: String },
    EvaluationReady { feedback: String },
    EvaluationFailed { notice: String },
}

impl Event {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::SourceMaterial { .. } => "source_material",
            Event::Answer { .. } => "answer",
            Event::NextQuestion => "next_question",
            Event::QuestionReady { .. } => "question_ready",
            Event::QuestionFailed { .. } => "question_failed",
            Event::EvaluationReady { .. } => "evaluation_ready",
            Event::EvaluationFailed { .. } => "evaluation_failed",
        }
    }
}
