//! Widget configuration

use crate::references::CitationKey;
use crate::state_machine::Theme;

pub const DEFAULT_API_BASE: &str = "https://api.clippy.help";
pub const DEFAULT_PORT: u16 = 8000;

/// Configuration for the widget core and its HTTP host
#[allow(clippy::module_name_repetitions)] // Matches WidgetContext and WidgetModel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// Base URL of the answer service, without a trailing slash
    pub api_base: String,
    /// Project to ask against; taken from the widget data fetch when unset
    pub project_id: Option<String>,
    /// Reference field that answer citations name
    pub citation_key: CitationKey,
    /// Initial color scheme
    pub theme: Theme,
    /// Port the renderer bridge listens on
    pub port: u16,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            project_id: None,
            citation_key: CitationKey::default(),
            theme: Theme::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl WidgetConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults
    /// with a warning.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_base = lookup("CLIPPY_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty())
            .unwrap_or(defaults.api_base);

        let project_id = lookup("CLIPPY_PROJECT_ID").filter(|id| !id.is_empty());

        Self {
            api_base,
            project_id,
            citation_key: parse_or("CLIPPY_CITATION_KEY", &lookup, defaults.citation_key),
            theme: parse_or("CLIPPY_THEME", &lookup, defaults.theme),
            port: parse_or("CLIPPY_PORT", &lookup, defaults.port),
        }
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %raw, error = %e, "Ignoring invalid configuration value");
            default
        }),
    }
}
