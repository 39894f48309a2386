//! Tagged stream events and their classification

use crate::answer::Citation;
use crate::error::ProtocolError;
use crate::references::Reference;
use serde::{Deserialize, Deserializer, Serialize};

pub const TAG_REFERENCES: &str = "references";
pub const TAG_PARTIAL_ANSWER: &str = "partial_answer";
pub const TAG_ANSWER: &str = "answer";
pub const TAG_ERROR: &str = "error";

/// One discrete unit of a stream: a discriminant tag and an opaque payload
#[allow(clippy::module_name_repetitions)] // Event is the protocol term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedEvent {
    pub tag: String,
    pub data: String,
}

impl TaggedEvent {
    #[must_use]
    pub fn new(tag: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            data: data.into(),
        }
    }

    /// The event synthesized for a transport failure
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(TAG_ERROR, message)
    }
}

/// Complete answer sent in one terminal event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub answer: String,
    #[serde(default, deserialize_with = "deserialize_sources")]
    pub sources: Vec<Citation>,
}

/// Null entries, or a null list, carry no citation and are dropped
fn deserialize_sources<'de, D>(deserializer: D) -> Result<Vec<Citation>, D::Error>
where
    D: Deserializer<'de>,
{
    let sources: Option<Vec<Option<Citation>>> = Option::deserialize(deserializer)?;
    Ok(sources.into_iter().flatten().flatten().collect())
}

/// A classified stream event
#[allow(clippy::module_name_repetitions)] // Event is the protocol term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Full reference list, replacing any earlier one
    References(Vec<Reference>),
    /// Chunk to append to the answer text
    PartialAnswer(String),
    /// Whole answer, replacing any text built so far
    Answer(AnswerPayload),
    /// Server- or transport-reported failure; payload kept for logs only
    Error(String),
}

impl StreamEvent {
    /// Events after which the session reads nothing further
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Answer(_) | StreamEvent::Error(_))
    }

    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            StreamEvent::References(_) => TAG_REFERENCES,
            StreamEvent::PartialAnswer(_) => TAG_PARTIAL_ANSWER,
            StreamEvent::Answer(_) => TAG_ANSWER,
            StreamEvent::Error(_) => TAG_ERROR,
        }
    }
}

/// Classify a tagged event. Unknown tags are a hard fault, not skipped.
///
/// # Errors
///
/// [`ProtocolError::UnrecognizedEvent`] for a tag outside the closed set, and
/// [`ProtocolError::MalformedPayload`] when a JSON payload does not parse.
pub fn demultiplex(event: TaggedEvent) -> Result<StreamEvent, ProtocolError> {
    let TaggedEvent { tag, data } = event;
    match tag.as_str() {
        TAG_REFERENCES => serde_json::from_str(&data)
            .map(StreamEvent::References)
            .map_err(|e| ProtocolError::malformed(TAG_REFERENCES, e)),
        TAG_PARTIAL_ANSWER => Ok(StreamEvent::PartialAnswer(data)),
        TAG_ANSWER => serde_json::from_str(&data)
            .map(StreamEvent::Answer)
            .map_err(|e| ProtocolError::malformed(TAG_ANSWER, e)),
        TAG_ERROR => Ok(StreamEvent::Error(data)),
        _ => Err(ProtocolError::unrecognized(tag)),
    }
}
