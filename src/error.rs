//! Error types shared across the widget core

#![allow(clippy::module_name_repetitions)] // Errors are named for the layer that raises them

use thiserror::Error;

/// Faults raised while classifying inbound stream events.
///
/// These are hard faults: the session that produced them ends `errored` and
/// the fault is surfaced to the renderer rather than swallowed.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unrecognized stream event tag `{tag}`")]
    UnrecognizedEvent { tag: String },
    #[error("malformed `{tag}` payload: {source}")]
    MalformedPayload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    #[must_use]
    pub fn unrecognized(tag: impl Into<String>) -> Self {
        Self::UnrecognizedEvent { tag: tag.into() }
    }

    #[must_use]
    pub fn malformed(tag: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedPayload {
            tag: tag.into(),
            source,
        }
    }
}

/// Transport failure with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    #[must_use]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Status(code), message)
    }

    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::status(status.as_u16(), err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, reset, or timed out
    Network,
    /// Non-success HTTP status
    Status(u16),
    /// Body could not be decoded
    Decode,
}

/// Errors from the low-level session controller
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a stream session is already open (cancel it before starting another)")]
    AlreadyOpen,
}

/// The renderer-facing runtime is gone
#[derive(Debug, Error)]
#[error("widget runtime has stopped")]
pub struct RuntimeStopped;
