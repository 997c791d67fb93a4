//! Tutoring requests built on the LLM client
//!
//! Three kinds of request: the reading guide for new material (and
//! follow-up questions about it), question authoring, and answer critique.
//! Engine failures come back as the fixed notice the learner should see.

use crate::config::Prompts;
use crate::db::Turn;
use crate::llm::{FinishReason, LlmErrorKind, LlmMessage, LlmRequest, Usage};
use crate::runtime::LlmClient;
use crate::state_machine::QuestionType;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::timeout;

const TEMPERATURE: f32 = 0.4;
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Successful tutor output with timing for telemetry
#[derive(Debug, Clone)]
pub struct TutorReply {
    pub text: String,
    pub usage: Option<Usage>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// A request that produced nothing usable; the cause is logged, not kept
#[derive(Debug, Clone)]
pub struct TutorFailure {
    /// Fixed text shown to the learner instead of a reply
    pub notice: String,
}

pub type TutorResult = Result<TutorReply, TutorFailure>;

pub struct Tutor<L> {
    llm: L,
    prompts: Prompts,
    timeout: Duration,
}

impl<L: LlmClient> Tutor<L> {
    pub fn new(llm: L, prompts: Prompts, timeout: Duration) -> Self {
        Self {
            llm,
            prompts,
            timeout,
        }
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// Main tutoring turn over the whole dialogue
    pub async fn explain(&self, system: &str, history: &[Turn]) -> TutorResult {
        let messages = history.iter().map(LlmMessage::from).collect();
        self.run(LlmRequest::new(system, messages)).await
    }

    pub async fn author_question(&self, context: &str, kind: QuestionType) -> TutorResult {
        let prompt = format!(
            "아래 학습 맥락을 기반으로 {kind} 중심의 영작 문제 1개를 출제하세요.\n\n\
             요구사항:\n\
             - 출력은 반드시 순수 텍스트\n\
             - 문제 문장(한국어) 1개\n\
             - 학습 힌트 1줄\n\
             - 정답 예시는 포함하지 말 것\n\n\
             [학습 맥락]\n{context}"
        );
        self.run(LlmRequest::single(&self.prompts.question_system, prompt))
            .await
    }

    pub async fn critique_answer(
        &self,
        context: &str,
        kind: QuestionType,
        question: &str,
        answer: &str,
    ) -> TutorResult {
        let prompt = format!(
            "아래 정보를 바탕으로 답안을 평가하세요.\n\n\
             출력 형식:\n\
             1) 평가 요약(좋은 점/개선점)\n\
             2) 수정 제안(필요 시)\n\
             3) 모범 답안 1개\n\
             4) 핵심 포인트 1줄\n\n\
             유형: {kind}\n\
             문제:\n{question}\n\n\
             학습 맥락:\n{context}\n\n\
             학습자 답안:\n{answer}"
        );
        self.run(LlmRequest::single(&self.prompts.critique_system, prompt))
            .await
    }

    /// Single attempt; no retries
    async fn run(&self, mut request: LlmRequest) -> TutorResult {
        request.temperature = Some(TEMPERATURE);
        request.max_tokens = Some(MAX_OUTPUT_TOKENS);

        let started_at = Utc::now();
        let response = match timeout(self.timeout, self.llm.complete(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let notice = match e.kind {
                    LlmErrorKind::RateLimit => &self.prompts.rate_limited,
                    LlmErrorKind::InvalidRequest => &self.prompts.bad_request,
                    _ => &self.prompts.engine_failed,
                };
                return Err(self.failure(notice, &e.message));
            }
            Err(_) => {
                return Err(self.failure(&self.prompts.engine_failed, "timed out"));
            }
        };
        let ended_at = Utc::now();

        let text = match response.finish_reason {
            FinishReason::Safety => {
                return Err(self.failure(&self.prompts.safety_blocked, "blocked by safety filter"));
            }
            _ if response.text.trim().is_empty() => {
                return Err(self.failure(&self.prompts.empty_response, "empty response"));
            }
            FinishReason::MaxTokens => format!("{}\n\n{}", response.text, self.prompts.cut_short),
            FinishReason::Stop | FinishReason::Other => response.text,
        };

        Ok(TutorReply {
            text,
            usage: response.usage,
            started_at,
            ended_at,
        })
    }

    fn failure(&self, notice: &str, cause: &str) -> TutorFailure {
        tracing::warn!(model = %self.llm.model_id(), cause, "Tutor request failed");
        TutorFailure {
            notice: notice.to_string(),
        }
    }
}

/// Message text for a freshly authored practice question
pub fn format_question(kind: QuestionType, question: &str) -> String {
    format!("[자동 영작 연습]\n유형: {kind}\n\n{question}\n\n답안을 영어로 보내주세요.")
}
