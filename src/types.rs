//! Core scalar and structural types shared across the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record identifier. Dense and monotonic within a collection: the first
/// record inserted into a fresh collection gets `1`, the next `2`, and so
/// on. Ids are never reused except after a whole-collection drop resets the
/// counter.
pub type RecordId = u32;

/// A dense embedding vector. Width is fixed per collection at creation time.
pub type Vector = Vec<f32>;

/// A JSON-like value used for record metadata and filter predicates.
///
/// The engine treats this as opaque data: it never inspects metadata
/// values except to inject or read the three reserved fields below, and it
/// evaluates filters by structural comparison only (see
/// [`crate::docstore::Filter`]).
pub type Value = serde_json::Value;

/// A metadata object: an unordered bag of named [`Value`]s.
///
/// `BTreeMap` rather than `HashMap` so that two documents with the same
/// fields serialize identically, which keeps snapshot/round-trip tests
/// deterministic.
pub type Document = BTreeMap<String, Value>;

/// Reserved metadata field holding the original document text.
pub const FIELD_DOC: &str = "_m_doc";
/// Reserved metadata field holding the engine-assigned [`RecordId`].
pub const FIELD_ID: &str = "_m_id";
/// Reserved metadata field holding the record's embedding vector.
pub const FIELD_EMBEDDING: &str = "_m_embedding";

/// Name of the reserved collection the [`crate::catalog::Catalog`] uses to
/// store its bookkeeping rows, mirrored from the system this engine was
/// modeled on (`_m_meta_db` / `_m_meta_collection`).
pub const META_COLLECTION: &str = "_m_meta_collection";

/// Growth chunk size for the HNSW node array, and the number of inserted
/// records between automatic snapshots (`PERSIST_BATCH`). Both reuse the
/// same constant, matching the system this engine was modeled on.
pub const GROW_BATCH: u32 = 1000;

/// A single record as returned from a query: the stored document text, its
/// metadata (including the reserved fields), and its distance to the query
/// vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hit {
    /// Engine-assigned identifier.
    pub id: RecordId,
    /// Original document text.
    pub document: String,
    /// User-supplied metadata, with reserved fields present.
    pub metadata: Document,
    /// Cosine distance to the query vector (`0.0` = identical, `2.0` =
    /// opposite).
    pub distance: f32,
}
