//! Property-based tests for the writing practice state machine

use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z가-힣][a-zA-Z가-힣 ]{0,30}"
}

fn arb_kind() -> impl Strategy<Value = QuestionType> {
    prop_oneof![
        Just(QuestionType::Vocabulary),
        Just(QuestionType::Phrase),
        Just(QuestionType::Pattern),
        Just(QuestionType::Transformation),
        Just(QuestionType::FillBlank),
    ]
}

fn arb_settled_state() -> impl Strategy<Value = WritingState> {
    prop_oneof![
        Just(WritingState::Idle),
        (arb_text(), arb_text(), arb_kind(), 1u32..1000).prop_map(
            |(context, question, kind, question_count)| WritingState::QuestionIssued {
                context,
                question,
                kind,
                question_count,
            }
        ),
        (arb_text(), arb_text(), arb_kind(), 1u32..1000).prop_map(
            |(context, question, kind, question_count)| WritingState::Evaluated {
                context,
                question,
                kind,
                question_count,
            }
        ),
    ]
}

fn arb_learner_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (arb_text(), 0u32..5).prop_map(|(context, offset)| Event::SourceMaterial { context, offset }),
        arb_text().prop_map(|text| Event::Answer { text }),
        Just(Event::NextQuestion),
    ]
}

/// Drive a learner event to a settled state, answering tutor effects the
/// way the runtime would
fn settle(state: &WritingState, event: Event, tutor_ok: bool) -> Option<(WritingState, Vec<Effect>)> {
    let mut result = transition(state, event).ok()?;
    let mut effects = Vec::new();
    loop {
        let follow_up = result.effects.iter().find_map(|effect| match effect {
            Effect::GenerateQuestion { kind, .. } if tutor_ok => Some(Event::QuestionReady {
                question: format!("{kind} question"),
            }),
            Effect::GenerateQuestion { .. } => Some(Event::QuestionFailed {
                notice: "failed".into(),
            }),
            Effect::EvaluateAnswer { .. } if tutor_ok => Some(Event::EvaluationReady {
                feedback: "feedback".into(),
            }),
            Effect::EvaluateAnswer { .. } => Some(Event::EvaluationFailed {
                notice: "failed".into(),
            }),
            _ => None,
        });
        effects.extend(result.effects.drain(..));
        match follow_up {
            Some(event) => result = transition(&result.new_state, event).ok()?,
            None => return Some((result.new_state, effects)),
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_rotation_has_period_five(i in 0u32..10_000) {
        prop_assert_eq!(QuestionType::cycle(i), QuestionType::cycle(i + 5));
    }

    #[test]
    fn prop_five_consecutive_types_are_a_rotation(start in 0u32..10_000) {
        let window: Vec<QuestionType> = (start..start + 5).map(QuestionType::cycle).collect();
        let shift = (start % 5) as usize;
        let mut expected = QuestionType::CYCLE.to_vec();
        expected.rotate_left(shift);
        prop_assert_eq!(window, expected);
    }

    #[test]
    fn prop_awaiting_states_have_context_and_question(
        state in arb_settled_state(),
        events in proptest::collection::vec((arb_learner_event(), any::<bool>()), 1..20),
    ) {
        let mut state = state;
        for (event, tutor_ok) in events {
            if let Some((next, _)) = settle(&state, event, tutor_ok) {
                state = next;
            }
            if let WritingState::QuestionIssued { context, question, .. } = &state {
                prop_assert!(!context.is_empty());
                prop_assert!(!question.is_empty());
            }
            let transient = matches!(state, WritingState::Drafting { .. } | WritingState::Evaluating { .. });
            prop_assert!(!transient);
        }
    }

    #[test]
    fn prop_count_only_resets_on_new_material(
        state in arb_settled_state(),
        events in proptest::collection::vec((arb_learner_event(), any::<bool>()), 1..20),
    ) {
        let mut state = state;
        for (event, tutor_ok) in events {
            let is_source = matches!(event, Event::SourceMaterial { .. });
            let before = state.question_count();
            if let Some((next, _)) = settle(&state, event, tutor_ok) {
                if let (Some(b), Some(a), false) = (before, next.question_count(), is_source) {
                    prop_assert!(a >= b);
                }
                state = next;
            }
        }
    }

    #[test]
    fn prop_next_question_increments_count_by_one(state in arb_settled_state()) {
        let before = state.question_count();
        let (after, effects) = settle(&state, Event::NextQuestion, true).unwrap();
        match before {
            None => {
                prop_assert_eq!(after, WritingState::Idle);
                prop_assert_eq!(effects, vec![Effect::ReportNoMaterial]);
            }
            Some(count) => {
                prop_assert_eq!(after.question_count(), Some(count + 1));
                prop_assert!(after.is_awaiting_answer());
                let expected = QuestionType::cycle(count);
                let issued_kind = matches!(after, WritingState::QuestionIssued { kind, .. } if kind == expected);
                prop_assert!(issued_kind);
            }
        }
    }

    #[test]
    fn prop_answer_only_accepted_when_pending(state in arb_settled_state(), text in arb_text()) {
        let pending = state.is_awaiting_answer();
        let result = transition(&state, Event::Answer { text });
        prop_assert_eq!(result.is_ok(), pending);
    }

    #[test]
    fn prop_source_material_seeds_count_from_offset(
        state in arb_settled_state(),
        context in arb_text(),
        offset in 0u32..5,
    ) {
        let (after, _) = settle(&state, Event::SourceMaterial { context: context.clone(), offset }, true).unwrap();
        prop_assert_eq!(
            after,
            WritingState::QuestionIssued {
                context,
                question: format!("{} question", QuestionType::cycle(offset)),
                kind: QuestionType::cycle(offset),
                question_count: offset + 1,
            }
        );
    }
}
