//! In-memory index of choreography definitions keyed by triggering signal type.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::data::ChoreographyDefinition;

/// Buckets preserve insertion order. No validation, no deduplication:
/// registering the same definition twice fires it twice.
#[derive(Debug, Default)]
pub struct Registry {
    by_type: HashMap<String, Vec<Arc<ChoreographyDefinition>>>,
    count: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ChoreographyDefinition) -> Arc<ChoreographyDefinition> {
        let def = Arc::new(definition);
        log::debug!("registering choreography '{}' on '{}'", def.label(), def.on);
        self.by_type
            .entry(def.on.clone())
            .or_default()
            .push(Arc::clone(&def));
        self.count += 1;
        def
    }

    pub fn register_all<I>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = ChoreographyDefinition>,
    {
        for def in definitions {
            self.register(def);
        }
    }

    /// All definitions for `signal_type`, in registration order. Empty when none.
    pub fn get_for_signal_type(&self, signal_type: &str) -> &[Arc<ChoreographyDefinition>] {
        self.by_type
            .get(signal_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.by_type.clear();
        self.count = 0;
    }

    /// Total number of registered definitions across all buckets.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Signal types with at least one definition, sorted for stable output.
    pub fn signal_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
