//! API request and response types

use crate::references::Reference;
use crate::state_machine::Theme;
use serde::{Deserialize, Serialize};

/// Request to replace the composer text
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
}

/// Request to submit a query. Without a query the composer text is used.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThemeRequest {
    pub theme: Theme,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub references: Vec<Reference>,
}

/// Commands are applied asynchronously; follow `/api/stream` for the result
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

impl AcceptedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self { accepted: true }
    }
}

impl Default for AcceptedResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
