//! Widget state types

use crate::answer::{Answer, AnswerAccumulator};
use crate::references::{resolve_citations, CitationKey, Reference, ReferenceStore};
use crate::session::{SessionId, SessionRecord, SessionStatus};
use crate::transport::WidgetData;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The finite UI-facing state. Exactly one value at any instant.
#[allow(clippy::module_name_repetitions)] // Serialized under this name for renderers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetState {
    #[default]
    Splash,
    UserTyping,
    Loading,
    Finished,
}

impl fmt::Display for WidgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WidgetState::Splash => "splash",
            WidgetState::UserTyping => "user_typing",
            WidgetState::Loading => "loading",
            WidgetState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Color scheme propagated from the host page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme `{other}` (expected `light` or `dark`)")),
        }
    }
}

/// Fixed configuration the state machine is constructed with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WidgetContext {
    /// Which reference field answer citations are matched against
    pub citation_key: CitationKey,
}

impl WidgetContext {
    #[must_use]
    pub fn new(citation_key: CitationKey) -> Self {
        Self { citation_key }
    }
}

/// Everything the widget knows. Only [`super::transition`] produces new models.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetModel {
    pub(crate) state: WidgetState,
    pub(crate) query: String,
    pub(crate) theme: Theme,
    pub(crate) session: Option<SessionRecord>,
    pub(crate) references: ReferenceStore,
    /// Answer being built by the open session
    pub(crate) draft: AnswerAccumulator,
    /// Finalized answer; empty unless `Finished`
    pub(crate) answer: Answer,
    pub(crate) widget: Option<WidgetData>,
    pub(crate) last_fault: Option<String>,
}

impl WidgetModel {
    #[must_use]
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn state(&self) -> WidgetState {
        self.state
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    #[must_use]
    pub fn references(&self) -> &ReferenceStore {
        &self.references
    }

    #[must_use]
    pub fn session(&self) -> Option<&SessionRecord> {
        self.session.as_ref()
    }

    /// The session whose deliveries are still accepted
    #[must_use]
    pub fn open_session(&self) -> Option<&SessionRecord> {
        self.session
            .as_ref()
            .filter(|s| s.status == SessionStatus::Open)
    }

    #[must_use]
    pub fn is_open_session(&self, id: SessionId) -> bool {
        self.open_session().is_some_and(|s| s.id == id)
    }

    /// Citations to display. Recomputed from the answer and reference store on
    /// every call; empty until the answer is finalized.
    #[must_use]
    pub fn citations(&self, context: &WidgetContext) -> Vec<Reference> {
        if self.state != WidgetState::Finished {
            return Vec::new();
        }
        resolve_citations(&self.answer, &self.references, context.citation_key)
    }

    #[must_use]
    pub fn snapshot(&self, context: &WidgetContext) -> WidgetSnapshot {
        WidgetSnapshot {
            state: self.state,
            query: self.query.clone(),
            theme: self.theme,
            answer: self.answer.clone(),
            streamed_text: self.draft.text().to_string(),
            citations: self.citations(context),
            session: self.session.clone(),
            widget: self.widget.clone(),
            last_fault: self.last_fault.clone(),
        }
    }

    /// Cross-field invariants that must hold after every transition
    ///
    /// # Errors
    ///
    /// A description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        if !self.answer.is_empty() && self.state != WidgetState::Finished {
            return Err(format!("answer text present in {}", self.state));
        }
        if self.open_session().is_some() != (self.state == WidgetState::Loading) {
            return Err(format!(
                "open session {:?} inconsistent with {}",
                self.open_session().map(|s| s.id),
                self.state
            ));
        }
        if self.state == WidgetState::Splash
            && (!self.query.is_empty() || !self.answer.is_empty() || self.references.is_loaded())
        {
            return Err("splash with leftover query, answer, or references".to_string());
        }
        Ok(())
    }
}

/// Read-only view handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetSnapshot {
    pub state: WidgetState,
    pub query: String,
    pub theme: Theme,
    pub answer: Answer,
    /// Text accumulated so far by the open session
    pub streamed_text: String,
    pub citations: Vec<Reference>,
    pub session: Option<SessionRecord>,
    /// Display copy; absent until the configuration fetch completes
    pub widget: Option<WidgetData>,
    pub last_fault: Option<String>,
}

impl Default for WidgetSnapshot {
    fn default() -> Self {
        WidgetModel::default().snapshot(&WidgetContext::default())
    }
}
