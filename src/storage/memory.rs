//! In-memory record storage for testing.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::storage::{Collection, Store};

/// In-memory record store.
///
/// Thread-safe implementation using `RwLock<HashMap>`. Documents are kept
/// serialized so tests exercise the same encode/decode path as `FileStore`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<(Collection, String), String>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents across all collections.
    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of documents in one collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.documents
            .read()
            .map(|d| d.keys().filter(|(c, _)| *c == collection).count())
            .unwrap_or(0)
    }

    /// Clear all documents from the store.
    pub fn clear(&self) {
        if let Ok(mut documents) = self.documents.write() {
            documents.clear();
        }
    }
}

impl Store for MemoryStore {
    fn read(&self, collection: Collection, key: &str) -> Result<Option<String>> {
        let documents = self
            .documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(documents.get(&(collection, key.to_string())).cloned())
    }

    fn write(&self, collection: Collection, key: &str, document: &str) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        documents.insert((collection, key.to_string()), document.to_string());
        Ok(())
    }

    fn scan(&self, collection: Collection) -> Result<Vec<String>> {
        let documents = self
            .documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(documents
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, doc)| doc.clone())
            .collect())
    }
}
