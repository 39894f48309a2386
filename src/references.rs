//! Source references and citation resolution

use crate::answer::{Answer, Citation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A source document excerpt the answer may cite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub path: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "page", alias = "page_identifier", alias = "pageIdentifier")]
    pub page_identifier: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Reference {
    /// Link label: the title when present, otherwise the page identifier
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.page_identifier)
    }
}

/// Which reference field a citation identifier is matched against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKey {
    #[default]
    Path,
    Page,
}

impl CitationKey {
    #[must_use]
    pub fn of<'a>(self, reference: &'a Reference) -> &'a str {
        match self {
            CitationKey::Path => &reference.path,
            CitationKey::Page => &reference.page_identifier,
        }
    }

    fn of_citation(self, citation: &Citation) -> &str {
        match (self, citation) {
            (_, Citation::Id(id)) => id,
            (CitationKey::Path, Citation::Source { path, .. }) => path,
            (CitationKey::Page, Citation::Source { page, .. }) => page,
        }
    }
}

impl fmt::Display for CitationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationKey::Path => write!(f, "path"),
            CitationKey::Page => write!(f, "page"),
        }
    }
}

impl FromStr for CitationKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(CitationKey::Path),
            "page" | "page_identifier" | "page_title" => Ok(CitationKey::Page),
            other => Err(format!("unknown citation key `{other}` (expected `path` or `page`)")),
        }
    }
}

/// The most recent full reference list received during a session.
///
/// Replaced wholesale, never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReferenceStore {
    references: Option<Vec<Reference>>,
}

impl ReferenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, references: Vec<Reference>) {
        self.references = Some(references);
    }

    pub fn clear(&mut self) {
        self.references = None;
    }

    /// Whether a `references` event has been received since the last clear
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.references.is_some()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Reference] {
        self.references.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Narrow the stored references down to the ones the answer cites.
///
/// 1. Citations resolve by exact match on the configured key, in citation
///    order; unresolved ones are dropped, source objects included.
/// 2. With no resolved citation, the first stored reference alone.
/// 3. Otherwise nothing.
#[must_use]
pub fn resolve_citations(answer: &Answer, store: &ReferenceStore, key: CitationKey) -> Vec<Reference> {
    let references = store.as_slice();
    let mut seen = HashSet::new();

    let cited: Vec<Reference> = answer
        .citations()
        .iter()
        .filter(|citation| !citation.is_blank())
        .filter_map(|citation| {
            let id = key.of_citation(citation);
            references
                .iter()
                .find(|r| !id.is_empty() && key.of(r) == id)
                .cloned()
        })
        .filter(|reference| seen.insert(key.of(reference).to_string()))
        .collect();

    if !cited.is_empty() {
        return cited;
    }

    references.first().cloned().into_iter().collect()
}
