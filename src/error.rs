//! Error types for the engine.
//!
//! The engine uses a hierarchical error system:
//! - [`EngineError`] is the top-level error returned by all public APIs.
//! - [`DocStoreError`], [`EmbedderError`], and [`SnapshotError`] provide
//!   detail for the corresponding collaborator (the document store, the
//!   embedding provider, and the HNSW snapshot format respectively).
//!
//! # Error handling pattern
//! ```rust,ignore
//! use kaerdb::{Engine, Config, Result};
//!
//! fn example() -> Result<()> {
//!     let engine = Engine::open("./data", Config::default())?;
//!     let collection = engine.create("notes")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error enum for all engine operations.
///
/// This is the only error type returned by public APIs. Use pattern
/// matching to handle specific cases, or the `is_*` helpers below for the
/// common checks.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `Insert` was called with a different number of documents than
    /// metadatas.
    #[error("documents and metadatas are mismatched: {documents} documents, {metadatas} metadatas")]
    FieldLengthMismatch {
        /// Number of documents supplied.
        documents: usize,
        /// Number of metadata objects supplied.
        metadatas: usize,
    },

    /// `open` was called on a name with no corresponding collection.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// A collection with this name already exists.
    #[error("collection already exists: {0}")]
    CollectionAlreadyExists(String),

    /// The embedding provider failed.
    #[error("embedder failure: {0}")]
    Embedder(#[from] EmbedderError),

    /// The document store failed.
    #[error("document store failure: {0}")]
    DocStore(#[from] DocStoreError),

    /// A catalog row was missing required fields or could not be decoded.
    #[error("catalog entry for {collection} is corrupted: {reason}")]
    MetaCorrupted {
        /// Collection whose catalog row is corrupted.
        collection: String,
        /// Human-readable description of what was wrong.
        reason: String,
    },

    /// Saving or loading an HNSW snapshot failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The embedder returned a vector whose width does not match the
    /// collection's configured dimension.
    #[error("index dimension mismatch: expected {expected}, got {got}")]
    IndexDimensionMismatch {
        /// Dimension configured for the collection.
        expected: u32,
        /// Dimension actually returned by the embedder.
        got: u32,
    },

    /// A configuration value failed validation.
    #[error("configuration error: {reason}")]
    Config {
        /// Description of the invalid configuration.
        reason: String,
    },

    /// An I/O error not already wrapped by a more specific variant.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Constructs a [`EngineError::Config`] with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a [`EngineError::CollectionNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CollectionNotFound(_))
    }

    /// Returns `true` if this is a [`EngineError::FieldLengthMismatch`].
    pub fn is_field_length_mismatch(&self) -> bool {
        matches!(self, Self::FieldLengthMismatch { .. })
    }

    /// Returns `true` if this originated in the document store.
    pub fn is_docstore(&self) -> bool {
        matches!(self, Self::DocStore(_))
    }

    /// Returns `true` if this originated in the embedder.
    pub fn is_embedder(&self) -> bool {
        matches!(self, Self::Embedder(_))
    }
}

/// Errors raised by a [`crate::docstore::DocStore`] implementation.
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// The underlying storage engine reported an error not covered by a
    /// more specific variant below.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A row could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The requested collection does not exist in the store.
    #[error("collection not found in store: {0}")]
    CollectionNotFound(String),

    /// The data directory or database file could not be opened.
    #[error("database not found at {0}")]
    DatabaseNotFound(String),

    /// The database is held open by another writer.
    #[error("database is locked")]
    DatabaseLocked,
}

impl From<redb::Error> for DocStoreError {
    fn from(err: redb::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redb::TransactionError> for DocStoreError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redb::TableError> for DocStoreError {
    fn from(err: redb::TableError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redb::StorageError> for DocStoreError {
    fn from(err: redb::StorageError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redb::CommitError> for DocStoreError {
    fn from(err: redb::CommitError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redb::DatabaseError> for DocStoreError {
    fn from(err: redb::DatabaseError) -> Self {
        match &err {
            redb::DatabaseError::DatabaseAlreadyOpen => Self::DatabaseLocked,
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<bincode::Error> for DocStoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DocStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<redb::Error> for EngineError {
    fn from(err: redb::Error) -> Self {
        Self::DocStore(DocStoreError::from(err))
    }
}

/// Errors raised by a [`crate::embedding::TextEmbedder`] implementation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The remote embedding provider returned a non-success response.
    #[error("embedding provider returned an error: {0}")]
    Provider(String),

    /// Transport-level failure (connection refused, timeout, DNS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider was asked to embed more texts in a single request than
    /// it accepts; the adapter is expected to split batches itself, so
    /// seeing this means the adapter has a bug, not the caller.
    #[error("too many texts in a single provider request: {count} > {max}")]
    TooManyTexts {
        /// Number of texts submitted.
        count: usize,
        /// Maximum accepted by the provider.
        max: usize,
    },
}

/// Errors raised while saving or loading an HNSW snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file did not start with the expected magic bytes.
    #[error("bad snapshot magic")]
    BadMagic,

    /// The file's format version is not supported by this build.
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    /// The file ended before all declared data was read.
    #[error("snapshot file is truncated")]
    Truncated,

    /// An I/O error occurred while reading or writing the snapshot file.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}
