use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_MINIMUM_LENGTH: usize = 1;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_MAXIMUM_SUGGESTIONS: usize = 25;

/// Wait before moving focus after a selection or a clear, so the element that
/// should receive focus has been drawn at least once.
pub const FOCUS_SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Which search result is allowed to populate the dropdown when several
/// searches are in flight at the same time.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultPolicy {
    /// Only the most recently issued search may update the results.
    #[default]
    LatestRequest,
    /// Whichever search completes last overwrites the results, even if a newer
    /// search was issued in the meantime.
    LastCompleted,
}

/// Tunables of a typeahead field. Loaded from the `[widget]` config section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TypeaheadOptions {
    pub placeholder: String,
    /// Characters needed before a search is scheduled
    pub minimum_length: usize,
    pub debounce_ms: u64,
    pub maximum_suggestions: usize,
    pub result_policy: ResultPolicy,
}

impl Default for TypeaheadOptions {
    fn default() -> Self {
        Self {
            placeholder: String::new(),
            minimum_length: DEFAULT_MINIMUM_LENGTH,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            maximum_suggestions: DEFAULT_MAXIMUM_SUGGESTIONS,
            result_policy: ResultPolicy::default(),
        }
    }
}

impl TypeaheadOptions {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn with_placeholder<T: Into<String>>(mut self, placeholder: T) -> Self {
        self.placeholder = placeholder.into();
        self
    }
    pub fn with_minimum_length(mut self, minimum_length: usize) -> Self {
        self.minimum_length = minimum_length;
        self
    }
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }
    pub fn with_maximum_suggestions(mut self, maximum_suggestions: usize) -> Self {
        self.maximum_suggestions = maximum_suggestions;
        self
    }
    pub fn with_result_policy(mut self, result_policy: ResultPolicy) -> Self {
        self.result_policy = result_policy;
        self
    }
}

/// Configuration mistakes detected when a typeahead field is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeaheadError {
    #[error("typeahead field `{0}` has no search method")]
    MissingSearchMethod(String),
    #[error("typeahead field `{0}` has no result template")]
    MissingResultTemplate(String),
    #[error("typeahead field `{0}` has no selected template")]
    MissingSelectedTemplate(String),
    #[error("typeahead field `{0}` must allow at least one suggestion")]
    NoSuggestionsAllowed(String),
}
