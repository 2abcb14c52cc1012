//! Read-through template cache
//!
//! This module provides [`TemplateCache`], a thread-safe map from identifier
//! to parsed template. Entries remember the file's modification time and are
//! ignored once the file on disk changes.

use crate::{ParsedTemplate, TemplateId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct CacheEntry {
    template: Arc<ParsedTemplate>,
    modified: Option<SystemTime>,
}

/// A thread-safe cache of parsed templates
///
/// A poisoned lock behaves like an empty cache: lookups miss and inserts are
/// dropped, so callers fall back to reading the file.
#[derive(Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<TemplateId, CacheEntry>>,
}

impl TemplateCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached template for `id`, if its recorded mtime equals `modified`
    pub fn get(&self, id: &TemplateId, modified: Option<SystemTime>) -> Option<Arc<ParsedTemplate>> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(id)?;
        (modified.is_some() && entry.modified == modified).then(|| Arc::clone(&entry.template))
    }

    /// Store a template, replacing any older entry for the same identifier
    pub fn insert(&self, template: Arc<ParsedTemplate>, modified: Option<SystemTime>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(template.id().clone(), CacheEntry { template, modified });
        }
    }

    /// Check if an identifier has an entry, stale or not
    pub fn contains(&self, id: &TemplateId) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(id))
            .unwrap_or(false)
    }

    /// Remove an entry
    pub fn remove(&self, id: &TemplateId) -> Option<Arc<ParsedTemplate>> {
        self.entries.write().ok()?.remove(id).map(|e| e.template)
    }

    /// Get the number of cached templates
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("entries", &self.len())
            .finish()
    }
}
