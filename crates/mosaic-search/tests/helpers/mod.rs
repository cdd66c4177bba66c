//! Test helpers for engine integration tests.
//!
//! Builds an in-memory store with one dataset and wraps it in an engine.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use mosaic_search::{
    DatasetSearch, InMemoryStackIndex, NewStack, SearchConfig, SearchEngine, SearchPage,
};
use uuid::Uuid;

/// An in-memory dataset and an engine over it.
pub struct TestLibrary {
    pub index: Arc<InMemoryStackIndex>,
    pub engine: SearchEngine,
    pub dataset_id: Uuid,
}

impl TestLibrary {
    pub fn new() -> Self {
        Self::with_index(InMemoryStackIndex::new(), SearchConfig::default())
    }

    pub fn with_config(config: SearchConfig) -> Self {
        Self::with_index(InMemoryStackIndex::new(), config)
    }

    pub fn with_index(index: InMemoryStackIndex, config: SearchConfig) -> Self {
        let index = Arc::new(index);
        let dataset_id = index.add_dataset();
        let engine = SearchEngine::new(index.clone(), config);
        Self {
            index,
            engine,
            dataset_id,
        }
    }

    pub fn add(&self, stack: NewStack) -> Uuid {
        self.index.add_stack(self.dataset_id, stack)
    }

    pub fn search(&self) -> DatasetSearch {
        self.engine.dataset(self.dataset_id)
    }

    /// The cat/red, cat/blue, dog library: returns (A, B, C).
    pub fn pets(&self) -> (Uuid, Uuid, Uuid) {
        let a = self.add(NewStack::new("A").with_tags(&["cat", "red"]));
        let b = self.add(NewStack::new("B").with_tags(&["cat", "blue"]));
        let c = self.add(NewStack::new("C").with_tags(&["dog"]));
        (a, b, c)
    }
}

pub fn ids(page: &SearchPage) -> HashSet<Uuid> {
    page.items.iter().copied().collect()
}

pub fn set(items: &[Uuid]) -> HashSet<Uuid> {
    items.iter().copied().collect()
}
