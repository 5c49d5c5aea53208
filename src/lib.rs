//! # An embeddable hybrid vector-plus-document search engine
//!
//! This crate stores collections of records — a free-text *document* plus a
//! structured *metadata* object — and answers queries that combine a
//! structured predicate over metadata with approximate nearest-neighbour
//! search over a dense embedding of the document text.
//!
//! At insertion, the document is turned into a vector by an external
//! embedding provider and indexed in an in-memory HNSW graph; the metadata
//! (plus the original text and the vector) is written to a document store.
//! At query time, the metadata predicate is evaluated first to obtain a
//! candidate id set, then the HNSW graph is searched for the nearest
//! neighbours among that set.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use kaerdb::{Engine, Config};
//! use kaerdb::embedding::stub::StubEmbedder;
//! use kaerdb::docstore::Filter;
//!
//! let mut config = Config::new("./data");
//! config.embedding.api_key = "key".to_string();
//! let engine = Engine::open(config, Box::new(StubEmbedder::new(1024)))?;
//!
//! let notes = engine.create("notes")?;
//! notes.insert(
//!     vec!["hello world".to_string()],
//!     vec![Default::default()],
//! )?;
//!
//! let hits = notes.query("hello", 5, Filter::All)?;
//! # Ok::<(), kaerdb::EngineError>(())
//! ```
//!
//! ## Key concepts
//!
//! - **[`Engine`]** creates, opens, and drops collections, and owns the
//!   resources they share: the document store, the catalog, and the
//!   embedder.
//! - **[`collection::Collection`]** orchestrates a single collection's
//!   insert/query/recovery lifecycle: id assignment, embedding, writing to
//!   the document store, indexing, and opportunistic snapshotting.
//! - **[`vector::HnswIndex`]** is the in-memory approximate nearest-neighbour
//!   graph, supporting a predicate-filtered search.
//! - **[`docstore::DocStore`]** and **[`embedding::RawEmbedder`]** are the
//!   two external collaborators the engine is built against; both are
//!   capability traits so tests can substitute deterministic stubs
//!   ([`docstore::memory::MemoryDocStore`], [`embedding::stub::StubEmbedder`])
//!   for the real, on-disk/networked implementations
//!   ([`docstore::redb_store::RedbDocStore`], [`embedding::http::HttpEmbedder`]).
//! - **[`catalog::Catalog`]** records, per collection, the path of its last
//!   HNSW snapshot and the id that snapshot covers, so a restart can resume
//!   without losing indexed state.
//!
//! ## Concurrency
//!
//! A collection's HNSW index uses a single-writer, many-readers discipline:
//! inserts take an exclusive lock, queries take a shared one and may run
//! concurrently with each other. `Engine` and `Collection` are `Send + Sync`
//! and are typically shared across threads behind an `Arc`.
//!
//! ## Non-goals
//!
//! Exact nearest-neighbour search; transactional updates across the
//! document store and the index; deletion or compaction of individual
//! vectors (only whole-collection drop is supported); multi-tenant
//! authorization; distributed replication. Running two engines against the
//! same data directory at once is undefined behaviour.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod catalog;
pub mod collection;
pub mod config;
pub mod docstore;
pub mod embedding;
mod engine;
pub mod error;
pub mod types;
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

/// Engine façade: create/open/drop collections.
pub use engine::Engine;

pub use config::{Config, EmbeddingConfig, EmbeddingModel, HnswConfig, StorageConfig};
pub use error::{DocStoreError, EmbedderError, EngineError, Result, SnapshotError};
pub use types::{Document, Hit, RecordId, Value, Vector};

pub use catalog::{Catalog, CatalogEntry};
pub use collection::Collection;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common usage.
///
/// ```rust
/// use kaerdb::prelude::*;
/// ```
pub mod prelude {
    pub use crate::collection::Collection;
    pub use crate::config::{Config, EmbeddingModel};
    pub use crate::docstore::Filter;
    pub use crate::engine::Engine;
    pub use crate::error::{EngineError, Result};
    pub use crate::types::{Hit, RecordId};
}
