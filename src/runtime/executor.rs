//! Study runtime executor
//!
//! Applies the decision policy to each inbound event, drives the writing
//! practice state machine through its effects, and persists the session.

use super::traits::{ArticleFetcher, LlmClient, Messenger, SessionStore, TelemetrySink};
use super::{ConversationLocks, InboundEvent};

use crate::classifier::{classify, Command, InputKind};
use crate::config::{Config, Limits, Prompts};
use crate::db::{DbError, Session, Turn};
use crate::state_machine::{transition, Effect, Event, WritingState};
use crate::telegram::{CallbackAction, InlineKeyboard};
use crate::telemetry::{self, TurnTrace, SYSTEM_PROMPT_NAME};
use crate::text;
use crate::tutor::{format_question, Tutor};
use rand::Rng;

/// Button press that has not been acknowledged yet
struct PendingCallback {
    id: String,
    message_id: i64,
}

/// Where the current event came from
struct Origin {
    chat_id: String,
    callback: Option<PendingCallback>,
}

/// Generic study runtime over any store, LLM, fetcher, messenger and telemetry
pub struct StudyRuntime<S, L, F, M, T> {
    store: S,
    tutor: Tutor<L>,
    fetcher: F,
    messenger: M,
    telemetry: T,
    prompts: Prompts,
    limits: Limits,
    locks: ConversationLocks,
}

impl<S, L, F, M, T> StudyRuntime<S, L, F, M, T>
where
    S: SessionStore,
    L: LlmClient,
    F: ArticleFetcher,
    M: Messenger,
    T: TelemetrySink,
{
    pub fn new(config: &Config, store: S, llm: L, fetcher: F, messenger: M, telemetry: T) -> Self {
        Self {
            store,
            tutor: Tutor::new(llm, config.prompts.clone(), config.limits.llm_timeout),
            fetcher,
            messenger,
            telemetry,
            prompts: config.prompts.clone(),
            limits: config.limits.clone(),
            locks: ConversationLocks::default(),
        }
    }

    /// Handle one inbound event to completion
    ///
    /// Events for the same chat are applied one after the other. Only store
    /// failures surface as errors; everything else is reported to the chat.
    pub async fn handle(&self, event: InboundEvent) -> Result<(), DbError> {
        match event {
            InboundEvent::Message { chat_id, text } => {
                let _guard = self.locks.acquire(&chat_id).await;
                self.handle_message(chat_id, &text).await
            }
            InboundEvent::Action {
                chat_id,
                callback_id,
                message_id,
                data,
            } => {
                let _guard = self.locks.acquire(&chat_id).await;
                let origin = Origin {
                    chat_id,
                    callback: Some(PendingCallback {
                        id: callback_id,
                        message_id,
                    }),
                };
                self.handle_action(origin, &data).await
            }
            InboundEvent::DetachedAction { callback_id } => {
                tracing::info!(callback_id = %callback_id, "Acknowledging press on a detached message");
                if let Err(e) = self
                    .messenger
                    .answer_callback(&callback_id, &self.prompts.expired_action)
                    .await
                {
                    tracing::warn!(error = %e, "Failed to answer callback");
                }
                Ok(())
            }
        }
    }

    // ========================================================================
    // Messages
    // ========================================================================

    async fn handle_message(&self, chat_id: String, text: &str) -> Result<(), DbError> {
        let kind = classify(text);
        tracing::info!(chat_id = %chat_id, kind = ?kind, "Handling message");

        match kind {
            InputKind::Command(Command::Help) => {
                self.deliver(&chat_id, &self.prompts.usage, None).await;
                return Ok(());
            }
            InputKind::Command(Command::Reset) => {
                self.store.clear(&chat_id).await?;
                self.deliver(&chat_id, &self.prompts.reset_done, None).await;
                return Ok(());
            }
            _ => {}
        }

        let (session, prompt) = tokio::join!(
            self.store.load(&chat_id),
            self.telemetry.prompt_override(SYSTEM_PROMPT_NAME)
        );
        let mut session = session?;
        let mut origin = Origin {
            chat_id,
            callback: None,
        };

        if session.writing.is_awaiting_answer() && !kind.is_source_material() {
            self.drive(
                &mut origin,
                &mut session,
                Event::Answer {
                    text: text.to_string(),
                },
            )
            .await;
            return self.store.save(&origin.chat_id, &session).await;
        }

        self.study_turn(&mut origin, session, kind, text, prompt)
            .await
    }

    /// Explain the input and, for new material, start a writing cycle
    async fn study_turn(
        &self,
        origin: &mut Origin,
        mut session: Session,
        kind: InputKind,
        text: &str,
        prompt: Option<telemetry::PromptOverride>,
    ) -> Result<(), DbError> {
        let is_source = kind.is_source_material();
        let (input, truncated) = match kind {
            InputKind::Url(url) => match self.fetcher.fetch(&url).await {
                Ok(article) => (article.text, article.truncated),
                Err(e) => {
                    tracing::warn!(chat_id = %origin.chat_id, url = %url, error = %e, "Article fetch failed");
                    self.deliver(&origin.chat_id, &self.prompts.fetch_failed, None)
                        .await;
                    return Ok(());
                }
            },
            _ if text.chars().count() > self.limits.max_text_len => {
                (text::truncate(text, self.limits.max_text_len), true)
            }
            _ => (text.to_string(), false),
        };

        if is_source {
            session.writing = session.writing.set_aside();
        }

        session.history.push(Turn::user(input.clone()));
        let system = prompt
            .as_ref()
            .map_or(self.prompts.tutor_system.as_str(), |p| p.prompt.as_str());

        let reply = match self.tutor.explain(system, &session.history).await {
            Ok(reply) => reply,
            Err(failure) => {
                session.history.pop();
                self.deliver(&origin.chat_id, &failure.notice, None).await;
                return self.store.save(&origin.chat_id, &session).await;
            }
        };
        session.history.push(Turn::model(reply.text.clone()));

        let trace_id = uuid::Uuid::new_v4().to_string();
        if truncated {
            self.deliver(&origin.chat_id, &self.prompts.truncated_notice, None)
                .await;
        }
        self.deliver(
            &origin.chat_id,
            &reply.text,
            Some(&InlineKeyboard::feedback(&trace_id)),
        )
        .await;

        if is_source {
            let offset = rand::thread_rng().gen_range(0..5);
            self.drive(
                origin,
                &mut session,
                Event::SourceMaterial {
                    context: reply.text.clone(),
                    offset,
                },
            )
            .await;
        }

        self.store.save(&origin.chat_id, &session).await?;

        self.telemetry
            .submit(telemetry::build_ingestion_payload(&TurnTrace {
                trace_id,
                chat_id: origin.chat_id.clone(),
                input,
                output: reply.text,
                model: self.tutor.model_id().to_string(),
                usage: reply.usage,
                started_at: reply.started_at,
                ended_at: reply.ended_at,
                prompt,
            }));
        Ok(())
    }

    // ========================================================================
    // Inline actions
    // ========================================================================

    async fn handle_action(&self, mut origin: Origin, data: &str) -> Result<(), DbError> {
        let action = CallbackAction::parse(data);
        tracing::info!(chat_id = %origin.chat_id, action = ?action, "Handling inline action");

        match action {
            CallbackAction::Feedback { positive, trace_id } => {
                if !trace_id.is_empty() {
                    self.telemetry
                        .submit(telemetry::build_score_payload(&trace_id, u8::from(positive)));
                }
                let thanks = if positive {
                    &self.prompts.thanks_good
                } else {
                    &self.prompts.thanks_bad
                };
                self.acknowledge(&mut origin, thanks, true).await;
                Ok(())
            }
            CallbackAction::NextQuestion => {
                let mut session = self.store.load(&origin.chat_id).await?;
                self.next_question(&mut origin, &mut session).await;
                self.store.save(&origin.chat_id, &session).await
            }
            CallbackAction::Unknown(data) => {
                tracing::warn!(chat_id = %origin.chat_id, data = %data, "Unrecognized inline action");
                self.acknowledge(&mut origin, &self.prompts.unknown_action, false)
                    .await;
                Ok(())
            }
        }
    }

    async fn next_question(&self, origin: &mut Origin, session: &mut Session) {
        self.drive(origin, session, Event::NextQuestion).await;
        // Only reached when the press was rejected mid-request
        self.acknowledge(origin, &self.prompts.busy, false).await;
    }

    // ========================================================================
    // State machine
    // ========================================================================

    /// Apply `event` and every follow-up event its effects produce
    async fn drive(&self, origin: &mut Origin, session: &mut Session, event: Event) {
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let event_name = current_event.name();
            let result = match transition(&session.writing, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(
                        chat_id = %origin.chat_id,
                        state = session.writing.name(),
                        event = event_name,
                        error = %e,
                        "Rejected writing practice event"
                    );
                    return;
                }
            };

            tracing::debug!(
                chat_id = %origin.chat_id,
                from = session.writing.name(),
                to = result.new_state.name(),
                event = event_name,
                question_count = ?result.new_state.question_count(),
                "Writing practice transition"
            );
            session.writing = result.new_state;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(origin, &session.writing, effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }
    }

    async fn execute_effect(
        &self,
        origin: &mut Origin,
        state: &WritingState,
        effect: Effect,
    ) -> Option<Event> {
        match effect {
            Effect::GenerateQuestion { context, kind } => {
                self.acknowledge(origin, &self.prompts.preparing_question, true)
                    .await;
                tracing::info!(chat_id = %origin.chat_id, kind = %kind, question_count = ?state.question_count(), "Authoring question");
                Some(match self.tutor.author_question(&context, kind).await {
                    Ok(reply) => Event::QuestionReady {
                        question: reply.text,
                    },
                    Err(failure) => Event::QuestionFailed {
                        notice: failure.notice,
                    },
                })
            }

            Effect::EvaluateAnswer {
                context,
                kind,
                question,
                answer,
            } => Some(
                match self
                    .tutor
                    .critique_answer(&context, kind, &question, &answer)
                    .await
                {
                    Ok(reply) => Event::EvaluationReady {
                        feedback: reply.text,
                    },
                    Err(failure) => Event::EvaluationFailed {
                        notice: failure.notice,
                    },
                },
            ),

            Effect::DeliverQuestion { kind, question } => {
                self.deliver(&origin.chat_id, &format_question(kind, &question), None)
                    .await;
                None
            }

            Effect::DeliverEvaluation { feedback } => {
                self.deliver(
                    &origin.chat_id,
                    &feedback,
                    Some(&InlineKeyboard::next_question()),
                )
                .await;
                None
            }

            Effect::DeliverNotice { text, offer_next } => {
                let keyboard = offer_next.then(InlineKeyboard::next_question);
                self.deliver(&origin.chat_id, &text, keyboard.as_ref()).await;
                None
            }

            Effect::ReportNoMaterial => {
                if origin.callback.is_some() {
                    self.acknowledge(origin, &self.prompts.no_material, true)
                        .await;
                } else {
                    self.deliver(&origin.chat_id, &self.prompts.no_material, None)
                        .await;
                }
                None
            }
        }
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Send a chat message; failures are logged and never abort the event
    async fn deliver(&self, chat_id: &str, text: &str, keyboard: Option<&InlineKeyboard>) {
        if let Err(e) = self.messenger.send_text(chat_id, text, keyboard).await {
            tracing::error!(chat_id, error = %e, "Message delivery failed");
        }
    }

    /// Answer the pending button press once, optionally removing its keyboard
    async fn acknowledge(&self, origin: &mut Origin, text: &str, clear_keyboard: bool) {
        let Some(callback) = origin.callback.take() else {
            return;
        };

        let answer = self.messenger.answer_callback(&callback.id, text);
        if clear_keyboard {
            let clear = self
                .messenger
                .clear_keyboard(&origin.chat_id, callback.message_id);
            let (answered, cleared) = tokio::join!(answer, clear);
            if let Err(e) = cleared {
                tracing::warn!(chat_id = %origin.chat_id, error = %e, "Failed to remove inline keyboard");
            }
            if let Err(e) = answered {
                tracing::warn!(chat_id = %origin.chat_id, error = %e, "Failed to answer callback");
            }
        } else if let Err(e) = answer.await {
            tracing::warn!(chat_id = %origin.chat_id, error = %e, "Failed to answer callback");
        }
    }
}
