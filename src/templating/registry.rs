//! Per-resource store of extracted and compiled sub-templates.
//!
//! Entries are keyed by canonical resource and identifier. An entry is
//! compiled at most once: later extractions of the same identifier never
//! replace a compiled entry, and every lookup hands out the same [`Arc`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::MAX_INCLUDE_DEPTH;
use crate::reference::TemplateKey;
use crate::templating::compiler::CompiledTemplate;
use crate::templating::extract::SubTemplate;

/// One sub-template slot in the registry.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Body text as extracted (still masked)
    pub text: String,
    /// Pipe-clause declarations
    pub extras: Vec<String>,
    compiled: Option<Arc<CompiledTemplate>>,
}

impl RegistryEntry {
    /// Whether the entry has been compiled
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }
}

/// Registry of every sub-template known to an engine.
#[derive(Debug)]
pub struct TemplateRegistry {
    resources: HashMap<String, HashMap<String, RegistryEntry>>,
    include_limit: usize,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    /// Create an empty registry with the default include depth limit
    #[must_use]
    pub fn new() -> Self {
        Self::with_include_limit(MAX_INCLUDE_DEPTH)
    }

    /// Create an empty registry that stops nested includes at `limit` levels
    #[must_use]
    pub fn with_include_limit(limit: usize) -> Self {
        Self {
            resources: HashMap::new(),
            include_limit: limit,
        }
    }

    /// Maximum include nesting honored while rendering
    #[must_use]
    pub fn include_limit(&self) -> usize {
        self.include_limit
    }

    /// Record an extracted sub-template.
    ///
    /// Returns `false` and leaves the entry untouched when it is already
    /// compiled; an uncompiled entry is overwritten.
    pub fn insert_extracted(&mut self, resource: &str, sub: SubTemplate) -> bool {
        let entries = self.resources.entry(resource.to_string()).or_default();
        if entries.get(&sub.id).is_some_and(RegistryEntry::is_compiled) {
            tracing::trace!("Keeping compiled {}{}", resource, sub.id);
            return false;
        }
        entries.insert(
            sub.id,
            RegistryEntry {
                text: sub.text,
                extras: sub.extras,
                compiled: None,
            },
        );
        true
    }

    /// Store the compiled form of `resource` + `id`, creating the entry if needed.
    pub fn register(&mut self, resource: &str, id: &str, compiled: CompiledTemplate) -> Arc<CompiledTemplate> {
        let compiled = Arc::new(compiled);
        let entry = self
            .resources
            .entry(resource.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert_with(|| RegistryEntry {
                text: String::new(),
                extras: Vec::new(),
                compiled: None,
            });
        entry.compiled = Some(Arc::clone(&compiled));
        compiled
    }

    /// The compiled template for `resource` + `id`, if any
    #[must_use]
    pub fn lookup(&self, resource: &str, id: &str) -> Option<Arc<CompiledTemplate>> {
        self.resources.get(resource)?.get(id)?.compiled.clone()
    }

    /// [`Self::lookup`] by key
    #[must_use]
    pub fn lookup_key(&self, key: &TemplateKey) -> Option<Arc<CompiledTemplate>> {
        self.lookup(&key.resource, &key.id)
    }

    /// The raw entry for `resource` + `id`, compiled or not
    #[cfg(test)]
    pub(crate) fn entry(&self, resource: &str, id: &str) -> Option<&RegistryEntry> {
        self.resources.get(resource)?.get(id)
    }

    /// Remove an entry, returning it
    pub fn remove(&mut self, resource: &str, id: &str) -> Option<RegistryEntry> {
        let entries = self.resources.get_mut(resource)?;
        let removed = entries.remove(id);
        if entries.is_empty() {
            self.resources.remove(resource);
        }
        removed
    }

    /// Entries of `resource` still waiting to be compiled, sorted by identifier
    #[must_use]
    pub fn uncompiled(&self, resource: &str) -> Vec<SubTemplate> {
        let Some(entries) = self.resources.get(resource) else {
            return Vec::new();
        };
        let mut pending: Vec<SubTemplate> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_compiled())
            .map(|(id, entry)| SubTemplate {
                id: id.clone(),
                text: entry.text.clone(),
                extras: entry.extras.clone(),
            })
            .collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        pending
    }

    /// Identifiers registered for `resource`, sorted
    #[must_use]
    pub fn ids(&self, resource: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .resources
            .get(resource)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Total number of entries across all resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.values().map(HashMap::len).sum()
    }

    /// Whether the registry holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
