//! The state manifest: a JSON map from application state names to template references.
//!
//! ```json
//! {
//!   "templates": {
//!     "home": "views/home.html#page",
//!     "settings": "views/settings.html#page"
//!   }
//! }
//! ```
//!
//! Only the `templates` map is read; any other top-level keys are ignored.

use serde::Deserialize;
use std::collections::BTreeMap;
use strsim::levenshtein;

use crate::core::{HandlebarError, Result};

/// Maximum Levenshtein distance, as a percentage of the requested name, for a
/// state to be suggested.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Parsed manifest contents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// State name to `resource#id` reference
    pub templates: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse manifest text fetched from `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::MalformedManifest`] when the text is not JSON
    /// or lacks a `templates` object of strings.
    pub fn parse(reference: &str, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| HandlebarError::MalformedManifest {
            reference: reference.to_string(),
            reason: e.to_string(),
        })
    }

    /// The template reference for `state`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::UnknownState`] carrying up to three similar
    /// state names when `state` is not in the manifest.
    pub fn reference_for(&self, state: &str) -> Result<&str> {
        self.templates.get(state).map(String::as_str).ok_or_else(|| HandlebarError::UnknownState {
            state: state.to_string(),
            suggestions: self.similar_states(state),
        })
    }

    fn similar_states(&self, target: &str) -> Vec<String> {
        let mut scored: Vec<(&String, usize)> =
            self.templates.keys().map(|name| (name, levenshtein(target, name))).collect();
        scored.sort_by_key(|(_, distance)| *distance);

        scored
            .into_iter()
            .filter(|(_, distance)| *distance <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
            .take(3)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Number of states
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the manifest declares no states
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
