//! Record storage traits for Grasp.
//!
//! `Store` is the raw keyed document contract: one JSON document per
//! `(collection, key)`, last writer wins per key. `StoreExt` layers typed
//! access over it for anything implementing `Record`.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::state::{Check, Chunk, DesignReview, Familiarity, ScoreRecord, Task};
use crate::error::{GraspError, Result};

/// The keyed record sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Tasks,
    Chunks,
    Checks,
    DesignReviews,
    Familiarity,
    ScoreHistory,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Self::Tasks,
        Self::Chunks,
        Self::Checks,
        Self::DesignReviews,
        Self::Familiarity,
        Self::ScoreHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Chunks => "chunks",
            Self::Checks => "checks",
            Self::DesignReviews => "design_reviews",
            Self::Familiarity => "familiarity",
            Self::ScoreHistory => "score_history",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for record storage backends.
pub trait Store: Send + Sync {
    /// Read the raw document stored under `key`.
    ///
    /// Returns `Ok(None)` if it doesn't exist.
    fn read(&self, collection: Collection, key: &str) -> Result<Option<String>>;

    /// Write a document, replacing any previous one under the same key.
    fn write(&self, collection: Collection, key: &str, document: &str) -> Result<()>;

    /// All documents in a collection, in no particular order.
    fn scan(&self, collection: Collection) -> Result<Vec<String>>;
}

/// Blanket implementation of Store for Arc-wrapped stores.
impl<T: Store + ?Sized> Store for Arc<T> {
    fn read(&self, collection: Collection, key: &str) -> Result<Option<String>> {
        (**self).read(collection, key)
    }

    fn write(&self, collection: Collection, key: &str, document: &str) -> Result<()> {
        (**self).write(collection, key, document)
    }

    fn scan(&self, collection: Collection) -> Result<Vec<String>> {
        (**self).scan(collection)
    }
}

/// A type persisted in one collection under its own key.
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn key(&self) -> String;
}

impl Record for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Record for Chunk {
    const COLLECTION: Collection = Collection::Chunks;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Record for Check {
    const COLLECTION: Collection = Collection::Checks;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Record for DesignReview {
    const COLLECTION: Collection = Collection::DesignReviews;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Record for Familiarity {
    const COLLECTION: Collection = Collection::Familiarity;

    fn key(&self) -> String {
        self.file_path.clone()
    }
}

impl Record for ScoreRecord {
    const COLLECTION: Collection = Collection::ScoreHistory;

    fn key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Typed access to a `Store`.
///
/// Documents that fail to decode are logged and treated as absent.
pub trait StoreExt: Store {
    /// Fetch one record by key.
    fn get<R: Record>(&self, key: &str) -> Result<Option<R>> {
        let Some(raw) = self.read(R::COLLECTION, key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                let err =
                    GraspError::malformed(format!("{} record {}: {}", R::COLLECTION, key, err));
                tracing::warn!("{} (treating as absent)", err);
                Ok(None)
            }
        }
    }

    /// Insert or replace a record.
    fn put<R: Record>(&self, record: &R) -> Result<()> {
        let document = serde_json::to_string_pretty(record)?;
        self.write(R::COLLECTION, &record.key(), &document)
    }

    /// Every decodable record in the collection.
    fn all<R: Record>(&self) -> Result<Vec<R>> {
        let mut records = Vec::new();
        for raw in self.scan(R::COLLECTION)? {
            match serde_json::from_str(&raw) {
                Ok(record) => records.push(record),
                Err(err) => {
                    let err = GraspError::malformed(format!("{} record: {}", R::COLLECTION, err));
                    tracing::warn!("{} (skipping)", err);
                }
            }
        }
        Ok(records)
    }

    /// Check if a record exists.
    fn exists<R: Record>(&self, key: &str) -> Result<bool> {
        Ok(self.get::<R>(key)?.is_some())
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
