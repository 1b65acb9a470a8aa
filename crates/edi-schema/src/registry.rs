//! Concurrent registry of loaded document plugs

use crate::model::DocumentPlug;
use dashmap::DashMap;
use std::sync::Arc;

/// Registry sharing immutable plugs across threads.
///
/// Plugs are handed out as `Arc<DocumentPlug>`; every parse keeps its own
/// cursor state, so one registered plug can serve concurrent parses.
#[derive(Debug, Default)]
pub struct PlugRegistry {
    plugs: DashMap<String, Arc<DocumentPlug>>,
}

impl PlugRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plug, replacing any previous entry with the same name
    pub fn register(&self, name: impl Into<String>, plug: DocumentPlug) -> Arc<DocumentPlug> {
        let plug = Arc::new(plug);
        self.plugs.insert(name.into(), Arc::clone(&plug));
        plug
    }

    /// Get a plug by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<DocumentPlug>> {
        self.plugs.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if a plug exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.plugs.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugs.is_empty()
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
