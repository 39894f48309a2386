//! Pure state transition function
//!
//! | From | Event | To |
//! |---|---|---|
//! | Splash | open composer | UserTyping |
//! | UserTyping | submit "" | UserTyping (ignored) |
//! | UserTyping | submit q | Loading, session started |
//! | Loading | stream ended / `answer` | Finished |
//! | Loading | `error` or protocol fault | Finished, fixed error answer |
//! | UserTyping, Finished | dismiss | Splash |
//! | any | reset | Splash, open session cancelled |

use super::event::SessionUpdate;
use super::{Effect, Event, WidgetModel, WidgetState};
use crate::answer::{Answer, Citation};
use crate::protocol::StreamEvent;
use crate::session::{SessionId, SessionRecord, SessionStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of a state transition
#[allow(clippy::module_name_repetitions)] // Paired with transition()
#[derive(Debug)]
pub struct TransitionResult {
    pub new_model: WidgetModel,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    #[must_use]
    pub fn new(model: WidgetModel) -> Self {
        Self {
            new_model: model,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[allow(clippy::module_name_repetitions)] // Paired with transition()
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition: {event} while {state}")]
    InvalidTransition {
        state: WidgetState,
        event: &'static str,
    },
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
///
/// # Errors
///
/// [`TransitionError::InvalidTransition`] when `event` has no transition
/// from the current state; the caller keeps the old model.
pub fn transition(model: &WidgetModel, event: Event) -> Result<TransitionResult, TransitionError> {
    match (model.state, event) {
        // ============================================================
        // Valid in every state
        // ============================================================
        (_, Event::Reset) => Ok(clear_to_splash(model)),

        (_, Event::SetTheme { theme }) => {
            let mut next = model.clone();
            next.theme = theme;
            Ok(TransitionResult::new(next).with_effect(Effect::PublishSnapshot))
        }

        (_, Event::WidgetDataLoaded { data }) => {
            let mut next = model.clone();
            next.widget = Some(data);
            Ok(TransitionResult::new(next).with_effect(Effect::PublishSnapshot))
        }

        // Deliveries from a cancelled, superseded, or finished session
        (_, Event::Session { session, .. }) if !model.is_open_session(session) => {
            Ok(TransitionResult::new(model.clone()))
        }

        // ============================================================
        // Composer
        // ============================================================
        (WidgetState::Splash, Event::OpenComposer) => {
            let mut next = model.clone();
            next.state = WidgetState::UserTyping;
            Ok(TransitionResult::new(next).with_effect(Effect::PublishSnapshot))
        }

        (WidgetState::UserTyping, Event::EditQuery { text }) => {
            let mut next = model.clone();
            next.query = text;
            Ok(TransitionResult::new(next).with_effect(Effect::PublishSnapshot))
        }

        (WidgetState::UserTyping, Event::Submit { query, .. }) if query.is_empty() => {
            Ok(TransitionResult::new(model.clone()))
        }

        (
            WidgetState::UserTyping,
            Event::Submit {
                query,
                session,
                started_at,
            },
        ) => Ok(start_session(model, query, session, started_at)),

        (WidgetState::UserTyping | WidgetState::Finished, Event::Dismiss) => {
            Ok(clear_to_splash(model))
        }

        // ============================================================
        // Stream deliveries for the open session
        // ============================================================
        (WidgetState::Loading, Event::Session { session, update }) => {
            Ok(apply_session_update(model, session, update))
        }

        (state, event) => Err(TransitionError::InvalidTransition {
            state,
            event: event.name(),
        }),
    }
}

/// Clear query, answer and references; cancel any open session
fn clear_to_splash(model: &WidgetModel) -> TransitionResult {
    let mut next = WidgetModel {
        theme: model.theme,
        widget: model.widget.clone(),
        session: model.session.clone(),
        ..WidgetModel::default()
    };

    let mut effects = Vec::new();
    if let Some(open) = model.open_session() {
        effects.push(Effect::CancelSession { session: open.id });
        next.session = Some(open.clone().with_status(SessionStatus::Cancelled));
    }
    effects.push(Effect::PublishSnapshot);

    TransitionResult::new(next).with_effects(effects)
}

fn start_session(
    model: &WidgetModel,
    query: String,
    session: SessionId,
    started_at: DateTime<Utc>,
) -> TransitionResult {
    let mut next = model.clone();
    next.state = WidgetState::Loading;
    next.query.clear();
    next.answer = Answer::default();
    next.draft.reset();
    next.references.clear();
    next.last_fault = None;
    next.session = Some(SessionRecord::open(session, started_at));

    TransitionResult::new(next)
        .with_effect(Effect::start_session(session, query))
        .with_effect(Effect::PublishSnapshot)
}

fn apply_session_update(
    model: &WidgetModel,
    session: SessionId,
    update: SessionUpdate,
) -> TransitionResult {
    let mut next = model.clone();

    match update {
        SessionUpdate::Stream(StreamEvent::References(references)) => {
            next.references.replace(references);
            TransitionResult::new(next).with_effect(Effect::PublishSnapshot)
        }

        SessionUpdate::Stream(StreamEvent::PartialAnswer(chunk)) => {
            if next.draft.append(&chunk) {
                TransitionResult::new(next).with_effect(Effect::PublishSnapshot)
            } else {
                // Text was already replaced by a terminal answer
                TransitionResult::new(model.clone())
            }
        }

        SessionUpdate::Stream(StreamEvent::Answer(payload)) => {
            // Single-reply servers send no reference list; their source
            // objects describe themselves
            if !next.references.is_loaded() {
                let carried: Vec<_> = payload
                    .sources
                    .iter()
                    .filter(|c| !c.is_blank())
                    .filter_map(Citation::as_reference)
                    .collect();
                if !carried.is_empty() {
                    next.references.replace(carried);
                }
            }
            next.draft.replace(payload.answer, payload.sources);
            TransitionResult::new(next).with_effect(Effect::PublishSnapshot)
        }

        SessionUpdate::Ended => {
            next.state = WidgetState::Finished;
            next.answer = next.draft.finalize();
            next.draft.reset();
            next.session = next
                .session
                .map(|s| s.with_status(SessionStatus::Completed));
            TransitionResult::new(next)
                .with_effect(Effect::CloseSession { session })
                .with_effect(Effect::PublishSnapshot)
        }

        SessionUpdate::Stream(StreamEvent::Error(_)) => {
            fail_session(next, session).with_effect(Effect::PublishSnapshot)
        }

        SessionUpdate::Fault(message) => {
            next.last_fault = Some(message.clone());
            fail_session(next, session)
                .with_effect(Effect::report_fault(session, message))
                .with_effect(Effect::PublishSnapshot)
        }
    }
}

/// Finish with the fixed error answer and no sources
fn fail_session(mut next: WidgetModel, session: SessionId) -> TransitionResult {
    next.state = WidgetState::Finished;
    next.answer = Answer::error();
    next.draft.reset();
    next.references.clear();
    next.session = next.session.map(|s| s.with_status(SessionStatus::Errored));
    TransitionResult::new(next).with_effect(Effect::CloseSession { session })
}
