//! An in-memory [`DocStore`] implementation, for tests.
//!
//! Not durable: a process restart loses all data. Useful for exercising the
//! [`crate::collection::Collection`] coordinator and the [`Filter`]
//! evaluator without any on-disk state.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::docstore::{DocStore, Filter};
use crate::error::Result;
use crate::types::Document;

/// A non-durable [`DocStore`] backed by an in-process map of vectors.
#[derive(Default)]
pub struct MemoryDocStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryDocStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocStore for MemoryDocStore {
    fn insert_many(&self, collection: &str, rows: Vec<Document>) -> Result<()> {
        let mut collections = self.collections.write().expect("lock poisoned");
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
        Ok(())
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let collections = self.collections.read().expect("lock poisoned");
        Ok(collections
            .get(collection)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default())
    }

    fn drop_collection(&self, collection: &str) -> Result<()> {
        let mut collections = self.collections.write().expect("lock poisoned");
        collections.remove(collection);
        Ok(())
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().expect("lock poisoned");
        Ok(collections.keys().cloned().collect())
    }
}
