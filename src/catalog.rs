//! The catalog: a reserved collection recording each user collection's
//! latest snapshot pointer.
//!
//! Stored as ordinary rows in a reserved collection name
//! ([`META_COLLECTION`]) of the same [`DocStore`] the engine already uses
//! for document rows — re-using it avoids a second durability story,
//! mirroring the `_m_meta_db`/`_m_meta_collection` reserved-collection
//! pattern this engine's design was modeled on.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::docstore::{DocStore, Filter};
use crate::error::{EngineError, Result};
use crate::types::{Document, Value, META_COLLECTION};

/// A catalog row: the persistence pointer for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Collection name (unique key).
    pub collection: String,
    /// Path of the most recent HNSW snapshot for this collection.
    pub snapshot_path: String,
    /// Largest record id included in that snapshot.
    pub last_id: u32,
    /// Node-array capacity of the index at snapshot time.
    pub size: u32,
}

const FIELD_COLLECTION: &str = "collection";
const FIELD_SNAPSHOT_PATH: &str = "snapshotPath";
const FIELD_LAST_ID: &str = "lastId";
const FIELD_SIZE: &str = "size";

impl CatalogEntry {
    fn into_document(self) -> Document {
        let mut doc = Document::new();
        doc.insert(FIELD_COLLECTION.to_string(), Value::from(self.collection));
        doc.insert(
            FIELD_SNAPSHOT_PATH.to_string(),
            Value::from(self.snapshot_path),
        );
        doc.insert(FIELD_LAST_ID.to_string(), Value::from(self.last_id));
        doc.insert(FIELD_SIZE.to_string(), Value::from(self.size));
        doc
    }

    fn from_document(doc: &Document) -> Result<Self> {
        let field = |name: &str| -> Result<&Value> {
            doc.get(name).ok_or_else(|| EngineError::MetaCorrupted {
                collection: doc
                    .get(FIELD_COLLECTION)
                    .and_then(|v| v.as_str())
                    .unwrap_or("<unknown>")
                    .to_string(),
                reason: format!("missing field {name}"),
            })
        };

        Ok(Self {
            collection: field(FIELD_COLLECTION)?
                .as_str()
                .ok_or_else(|| EngineError::MetaCorrupted {
                    collection: "<unknown>".to_string(),
                    reason: format!("{FIELD_COLLECTION} is not a string"),
                })?
                .to_string(),
            snapshot_path: field(FIELD_SNAPSHOT_PATH)?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            last_id: field(FIELD_LAST_ID)?.as_u64().unwrap_or(0) as u32,
            size: field(FIELD_SIZE)?.as_u64().unwrap_or(0) as u32,
        })
    }
}

/// The catalog/meta registry (component C4).
pub struct Catalog {
    store: Arc<dyn DocStore>,
}

impl Catalog {
    /// Creates a catalog backed by `store`'s reserved meta collection.
    pub fn new(store: Arc<dyn DocStore>) -> Self {
        Self { store }
    }

    /// Upserts the catalog row for `collection`.
    pub fn write(
        &self,
        collection: &str,
        snapshot_path: &str,
        last_id: u32,
        size: u32,
    ) -> Result<()> {
        let entry = CatalogEntry {
            collection: collection.to_string(),
            snapshot_path: snapshot_path.to_string(),
            last_id,
            size,
        };
        self.store.upsert_one(
            META_COLLECTION,
            FIELD_COLLECTION,
            &Value::from(collection),
            entry.into_document(),
        )
    }

    /// Reads the catalog row for `collection`, if one exists.
    pub fn read(&self, collection: &str) -> Result<Option<CatalogEntry>> {
        let row = self
            .store
            .find_one(META_COLLECTION, &Filter::Eq(FIELD_COLLECTION.to_string(), Value::from(collection)))?;
        row.map(|doc| CatalogEntry::from_document(&doc)).transpose()
    }

    /// Deletes the catalog row for `collection`, if any.
    pub fn drop(&self, collection: &str) -> Result<()> {
        let rows = self.store.find(META_COLLECTION, &Filter::All)?;
        let remaining: Vec<Document> = rows
            .into_iter()
            .filter(|row| row.get(FIELD_COLLECTION) != Some(&Value::from(collection)))
            .collect();
        self.store.drop_collection(META_COLLECTION)?;
        if !remaining.is_empty() {
            self.store.insert_many(META_COLLECTION, remaining)?;
        }
        Ok(())
    }
}
