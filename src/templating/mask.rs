//! Raw block masking.
//!
//! Raw blocks (`{$% ... %$}`) hold verbatim content that must never be
//! interpreted as markup. Before any structural parsing, every raw block is
//! swapped for a sentinel of the same wrapped form carrying a random numeric
//! payload (`{$%48151623%$}`). The compiler resolves sentinels back to their
//! content at compile time; inheritance uses [`MaskTable::unmask`] to rebuild
//! source text byte-for-byte.
//!
//! Entries are never removed from the table. Unmasking nulls an entry so the
//! same sentinel is never generated twice for one engine.

use rand::Rng;
use std::collections::HashMap;

use crate::constants::{MASK_PAYLOAD_RANGE, RAW_CLOSE, RAW_OPEN};

/// Mapping from generated sentinel to the raw span it replaced.
#[derive(Debug, Default)]
pub struct MaskTable {
    /// `None` marks an entry consumed by [`MaskTable::unmask`]
    entries: HashMap<String, Option<String>>,
}

impl MaskTable {
    /// Create an empty mask table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `raw_span` and return a fresh sentinel for it.
    ///
    /// The sentinel is regenerated until it neither exists in the table (active
    /// or consumed) nor occurs anywhere in `current_content`.
    pub fn mask(&mut self, raw_span: &str, current_content: &str) -> String {
        let mut rng = rand::thread_rng();
        let sentinel = loop {
            let candidate =
                format!("{RAW_OPEN}{}{RAW_CLOSE}", rng.gen_range(0..MASK_PAYLOAD_RANGE));
            if !self.entries.contains_key(&candidate) && !current_content.contains(&candidate) {
                break candidate;
            }
        };
        self.entries.insert(sentinel.clone(), Some(raw_span.to_string()));
        sentinel
    }

    /// Replace every raw block in `content` with a sentinel.
    ///
    /// A raw block runs from `{$%` to the first following `%$}`. An opener with
    /// no terminator is left untouched for the lexer to report.
    pub fn mask_all(&mut self, content: &str) -> String {
        let mut result = content.to_string();
        let mut search_from = 0;
        let mut masked = 0usize;

        while let Some(rel_start) = result[search_from..].find(RAW_OPEN) {
            let start = search_from + rel_start;
            let Some(rel_end) = result[start + RAW_OPEN.len()..].find(RAW_CLOSE) else {
                break;
            };
            let end = start + RAW_OPEN.len() + rel_end + RAW_CLOSE.len();

            let raw_span = result[start..end].to_string();
            let sentinel = self.mask(&raw_span, &result);
            result.replace_range(start..end, &sentinel);
            search_from = start + sentinel.len();
            masked += 1;
        }

        if masked > 0 {
            tracing::debug!("Masked {} raw block(s)", masked);
        }
        result
    }

    /// Restore every active sentinel in `content` to its original raw span.
    ///
    /// Restored entries are consumed. Sentinel-shaped text that is unknown or
    /// already consumed is left as-is.
    pub fn unmask(&mut self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find(RAW_OPEN) {
            let after_open = &rest[start + RAW_OPEN.len()..];
            // the payload holds at least one character
            let Some(first) = after_open.chars().next() else {
                break;
            };
            let Some(rel_end) = after_open[first.len_utf8()..].find(RAW_CLOSE) else {
                break;
            };
            let end = start + RAW_OPEN.len() + first.len_utf8() + rel_end + RAW_CLOSE.len();
            let candidate = &rest[start..end];

            result.push_str(&rest[..start]);
            match self.entries.get_mut(candidate).and_then(Option::take) {
                Some(raw_span) => result.push_str(&raw_span),
                None => result.push_str(candidate),
            }
            rest = &rest[end..];
        }

        result.push_str(rest);
        result
    }

    /// Look up the verbatim content behind an active sentinel.
    ///
    /// Returns the text between the raw delimiters, without consuming the entry.
    #[must_use]
    pub fn resolve(&self, sentinel: &str) -> Option<&str> {
        let span = self.entries.get(sentinel)?.as_deref()?;
        let inner = span.strip_prefix(RAW_OPEN).unwrap_or(span);
        Some(inner.strip_suffix(RAW_CLOSE).unwrap_or(inner))
    }

    /// Number of sentinels still waiting to be unmasked
    #[cfg(test)]
    pub(crate) fn active_len(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_some()).count()
    }
}
