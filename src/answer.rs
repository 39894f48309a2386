//! Answer text and the accumulator that builds it from stream events

use crate::references::Reference;
use serde::{Deserialize, Serialize};

/// Fixed user-facing message shown when a session fails
pub const ERROR_MESSAGE: &str = "Something went wrong! Please try again.";

/// A citation attached to a finalized answer.
///
/// Streaming servers cite by identifier (a path or a page identifier). The
/// single-response variant cites with whole source objects instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Citation {
    Id(String),
    Source {
        #[serde(default)]
        path: String,
        #[serde(default)]
        page: String,
        #[serde(default)]
        title: Option<String>,
    },
}

impl Citation {
    /// Citations with no identifier at all are never displayed
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Citation::Id(id) => id.is_empty(),
            Citation::Source { path, page, .. } => path.is_empty() && page.is_empty(),
        }
    }

    /// Self-describing reference carried by a source object
    #[must_use]
    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            Citation::Id(_) => None,
            Citation::Source { path, page, title } => Some(Reference {
                path: path.clone(),
                text: String::new(),
                page_identifier: page.clone(),
                title: title.clone(),
            }),
        }
    }
}

/// Finalized answer exposed to the renderer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Citation list; `None` when the server never sent one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Citation>>,
}

impl Answer {
    /// The answer shown after a failed session: fixed message, no sources
    #[must_use]
    pub fn error() -> Self {
        Self {
            text: ERROR_MESSAGE.to_string(),
            sources: Some(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn citations(&self) -> &[Citation] {
        self.sources.as_deref().unwrap_or_default()
    }
}

/// How the current session's text is being built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulatorMode {
    /// Chunks from `partial_answer` events, concatenated in arrival order
    Append,
    /// One terminal `answer` write replacing everything
    Replace,
}

/// Builds one session's answer text.
///
/// The mode is not configured up front; it follows whichever event kind the
/// server sends. Once a replace has happened, further appends are refused.
#[allow(clippy::module_name_repetitions)] // Reads as one family with Answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerAccumulator {
    text: String,
    sources: Option<Vec<Citation>>,
    mode: Option<AccumulatorMode>,
}

impl AnswerAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a streamed chunk. Returns `false` if the chunk was refused
    /// because the text was already replaced wholesale.
    pub fn append(&mut self, chunk: &str) -> bool {
        if self.mode == Some(AccumulatorMode::Replace) {
            return false;
        }
        self.mode = Some(AccumulatorMode::Append);

        // A `\` ending the previous chunk pairs with an `n` opening this one
        let mut chunk = chunk;
        if self.text.ends_with('\\') {
            if let Some(rest) = chunk.strip_prefix('n') {
                self.text.pop();
                self.text.push('\n');
                chunk = rest;
            }
        }
        self.text.push_str(&collapse_newline_escapes(chunk));
        true
    }

    /// Overwrite the text and citation list with a terminal answer
    pub fn replace(&mut self, text: String, sources: Vec<Citation>) {
        self.mode = Some(AccumulatorMode::Replace);
        self.text = text;
        self.sources = Some(sources.into_iter().filter(|c| !c.is_blank()).collect());
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn mode(&self) -> Option<AccumulatorMode> {
        self.mode
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Snapshot the accumulated state as a finalized answer
    #[must_use]
    pub fn finalize(&self) -> Answer {
        Answer {
            text: self.text.clone(),
            sources: self.sources.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Replace each literal two-character `\n` escape with a line break.
///
/// Upstream double-encodes newlines in streamed chunks; this is not a general
/// unescape and leaves every other backslash sequence alone.
#[must_use]
pub fn collapse_newline_escapes(text: &str) -> String {
    text.replace("\\n", "\n")
}
