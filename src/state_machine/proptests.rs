//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::state::*;
use super::transition::*;
use super::*;
use crate::answer::Citation;
use crate::protocol::{AnswerPayload, StreamEvent};
use crate::references::{CitationKey, Reference};
use crate::session::{SessionId, SessionStatus};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> WidgetContext {
    WidgetContext::new(CitationKey::Path)
}

fn run(events: Vec<Event>) -> WidgetModel {
    events
        .into_iter()
        .fold(WidgetModel::default(), |model, event| {
            match transition(&model, event) {
                Ok(result) => result.new_model,
                Err(_) => model,
            }
        })
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// A small pool so deliveries hit both the open session and stale ones
fn arb_session() -> impl Strategy<Value = SessionId> {
    (1u128..5).prop_map(SessionId::from_u128)
}

fn arb_reference() -> impl Strategy<Value = Reference> {
    ("/[a-c]", "[A-C][a-z]{0,4}").prop_map(|(path, page)| Reference {
        path,
        text: String::new(),
        page_identifier: page,
        title: None,
    })
}

fn arb_chunk() -> impl Strategy<Value = String> {
    prop_oneof!["[a-z ]{0,6}", Just("\\".to_string()), Just("n".to_string()), Just("\\n".to_string())]
}

fn arb_citation() -> impl Strategy<Value = Citation> {
    prop_oneof![
        "/[a-d]?".prop_map(Citation::Id),
        ("/[a-d]", "[A-D]").prop_map(|(path, page)| Citation::Source {
            path,
            page,
            title: None,
        }),
    ]
}

fn arb_stream_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        proptest::collection::vec(arb_reference(), 0..4).prop_map(StreamEvent::References),
        arb_chunk().prop_map(StreamEvent::PartialAnswer),
        ("[a-z ]{0,10}", proptest::collection::vec(arb_citation(), 0..3))
            .prop_map(|(answer, sources)| StreamEvent::Answer(AnswerPayload { answer, sources })),
        "[a-z ]{1,10}".prop_map(StreamEvent::Error),
    ]
}

fn arb_update() -> impl Strategy<Value = SessionUpdate> {
    prop_oneof![
        4 => arb_stream_event().prop_map(SessionUpdate::Stream),
        1 => Just(SessionUpdate::Ended),
        1 => "[a-z]{1,8}".prop_map(SessionUpdate::Fault),
    ]
}

fn arb_theme() -> impl Strategy<Value = Theme> {
    prop_oneof![Just(Theme::Light), Just(Theme::Dark)]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        2 => Just(Event::OpenComposer),
        2 => "[a-z ]{0,8}".prop_map(|text| Event::EditQuery { text }),
        2 => ("[a-z]{0,4}", arb_session()).prop_map(|(query, session)| Event::Submit {
            query,
            session,
            started_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }),
        1 => Just(Event::Dismiss),
        1 => Just(Event::Reset),
        1 => arb_theme().prop_map(|theme| Event::SetTheme { theme }),
        6 => (arb_session(), arb_update()).prop_map(|(session, update)| Event::Session { session, update }),
    ]
}

fn arb_history() -> impl Strategy<Value = Vec<Event>> {
    proptest::collection::vec(arb_event(), 0..30)
}

fn effects_are_valid(effects: &[Effect], model: &WidgetModel) -> bool {
    effects.iter().all(|effect| match effect {
        Effect::StartSession { session, .. } => model.is_open_session(*session),
        Effect::CloseSession { .. } | Effect::ReportFault { .. } => {
            model.state() == WidgetState::Finished
        }
        Effect::CancelSession { session } => !model.is_open_session(*session),
        Effect::PublishSnapshot => true,
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_transitions_preserve_invariants(events in arb_history()) {
        let mut model = WidgetModel::default();

        for event in events {
            let before = model.clone();
            match transition(&model, event.clone()) {
                Ok(result) => {
                    prop_assert!(
                        result.new_model.check_invariants().is_ok(),
                        "{:?} after {:?}", result.new_model.check_invariants(), event
                    );
                    prop_assert!(
                        effects_are_valid(&result.effects, &result.new_model),
                        "Invalid effects {:?} after {:?}", result.effects, event
                    );
                    model = result.new_model;
                }
                Err(TransitionError::InvalidTransition { state, .. }) => {
                    prop_assert_eq!(state, before.state());
                }
            }
        }
    }

    #[test]
    fn prop_reset_always_returns_to_splash(events in arb_history()) {
        let model = run(events);
        let result = transition(&model, Event::Reset);
        prop_assert!(result.is_ok(), "Reset failed: {:?}", result);
        let result = result.unwrap();
        let next = &result.new_model;

        prop_assert_eq!(next.state(), WidgetState::Splash);
        prop_assert!(next.query().is_empty());
        prop_assert!(next.answer().is_empty());
        prop_assert!(!next.references().is_loaded());
        prop_assert!(next.open_session().is_none());
        prop_assert_eq!(next.theme, model.theme);

        let cancels = result.effects.iter().filter(|e| matches!(e, Effect::CancelSession { .. })).count();
        prop_assert_eq!(cancels, usize::from(model.open_session().is_some()));
    }

    #[test]
    fn prop_stale_deliveries_change_nothing(events in arb_history(), update in arb_update()) {
        let model = run(events);
        let stale = SessionId::from_u128(99);

        let result = transition(&model, Event::Session { session: stale, update });
        prop_assert!(result.is_ok());
        let result = result.unwrap();
        prop_assert_eq!(&result.new_model, &model);
        prop_assert!(result.effects.is_empty());
    }

    #[test]
    fn prop_empty_submit_is_noop(edits in proptest::collection::vec("[a-z]{0,4}", 0..3), session in arb_session()) {
        let mut events = vec![Event::OpenComposer];
        events.extend(edits.into_iter().map(|text| Event::EditQuery { text }));
        let typing = run(events);

        let result = transition(&typing, Event::Submit {
            query: String::new(),
            session,
            started_at: Utc::now(),
        }).unwrap();

        prop_assert_eq!(&result.new_model, &typing);
        prop_assert!(result.effects.is_empty());
    }

    #[test]
    fn prop_full_answer_takes_precedence(
        before in proptest::collection::vec(arb_chunk(), 0..4),
        after in proptest::collection::vec(arb_chunk(), 0..4),
        text in "[a-z ]{1,10}",
    ) {
        let session = SessionId::from_u128(1);
        let deliver = |update: SessionUpdate| Event::Session { session, update };
        let answer = StreamEvent::Answer(AnswerPayload { answer: text, sources: Vec::new() });

        let mut prefix = vec![
            Event::OpenComposer,
            Event::Submit { query: "q".to_string(), session, started_at: Utc::now() },
        ];
        prefix.extend(before.into_iter().map(|c| deliver(SessionUpdate::Stream(StreamEvent::PartialAnswer(c)))));
        prefix.push(deliver(SessionUpdate::Stream(answer)));

        let mut with_late_chunks = prefix.clone();
        with_late_chunks.extend(after.into_iter().map(|c| deliver(SessionUpdate::Stream(StreamEvent::PartialAnswer(c)))));
        with_late_chunks.push(deliver(SessionUpdate::Ended));

        let mut direct = prefix;
        direct.push(deliver(SessionUpdate::Ended));

        let late = run(with_late_chunks);
        let expected = run(direct);
        prop_assert_eq!(late.state(), WidgetState::Finished);
        prop_assert_eq!(late.answer(), expected.answer());
        prop_assert_eq!(late.session().map(|s| s.status), Some(SessionStatus::Completed));
    }

    #[test]
    fn prop_finished_answer_is_never_empty_after_error(events in arb_history(), message in "[a-z]{1,8}") {
        let model = run(events);
        let Some(open) = model.open_session().map(|s| s.id) else {
            return Ok(());
        };

        let result = transition(&model, Event::Session {
            session: open,
            update: SessionUpdate::Stream(StreamEvent::Error(message)),
        }).unwrap();

        prop_assert_eq!(result.new_model.state(), WidgetState::Finished);
        prop_assert_eq!(result.new_model.answer().text.as_str(), crate::answer::ERROR_MESSAGE);
        prop_assert!(result.new_model.citations(&test_context()).is_empty());
    }
}
