//! The engine façade (component C6): creates, opens, and drops collections,
//! and owns the resources every collection shares — the document store, the
//! catalog, and the embedder.
//!
//! # Example
//! ```rust,ignore
//! use kaerdb::{Engine, Config};
//! use kaerdb::embedding::stub::StubEmbedder;
//!
//! let config = Config::new("./data");
//! let engine = Engine::open(config, Box::new(StubEmbedder::new(1024)))?;
//! let notes = engine.create("notes")?;
//! notes.insert(vec!["hello world".into()], vec![Default::default()])?;
//! # Ok::<(), kaerdb::EngineError>(())
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::collection::Collection;
use crate::config::Config;
use crate::docstore::redb_store::RedbDocStore;
use crate::docstore::DocStore;
use crate::embedding::{RawEmbedder, TextEmbedder};
use crate::error::{EngineError, Result};
use crate::types::META_COLLECTION;

/// Creates, opens, and drops collections against a single on-disk data
/// directory.
///
/// Holds the resources every collection shares: the document store, the
/// catalog, and the embedder. At most one live [`Collection`] coordinator
/// exists per name in a process; [`Engine::open`] and [`Engine::create`]
/// both register into that cache, and repeated calls for the same name
/// return the same coordinator rather than re-running recovery.
pub struct Engine {
    config: Config,
    data_dir: PathBuf,
    dimension: u32,
    docstore: Arc<dyn DocStore>,
    catalog: Arc<Catalog>,
    embedder: Arc<TextEmbedder>,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self.collections.read().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("Engine")
            .field("data_dir", &self.data_dir)
            .field("dimension", &self.dimension)
            .field("open_collections", &open)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Opens (creating if absent) the document store at `config.storage.data_dir`
    /// and returns an engine backed by `provider` for all embedding calls.
    ///
    /// `provider`'s [`RawEmbedder::dimension`] must match
    /// `config.embedding.model.dimension()`: the two are independent values
    /// supplied by the caller (the model name picks a dimension by table
    /// lookup; the provider is whatever actually produces vectors), and a
    /// mismatch between them would silently corrupt every collection's
    /// index, so it is checked once here rather than on every insert.
    #[instrument(skip(config, provider), fields(data_dir = %config.storage.data_dir.display()))]
    pub fn open(config: Config, provider: Box<dyn RawEmbedder>) -> Result<Self> {
        config.validate()?;

        let expected = config.embedding.model.dimension();
        let got = provider.dimension();
        if got != expected {
            return Err(EngineError::config(format!(
                "embedder produces {got}-wide vectors but model {:?} requires {expected}",
                config.embedding.model
            )));
        }

        std::fs::create_dir_all(&config.storage.data_dir)?;
        let docstore: Arc<dyn DocStore> =
            Arc::new(RedbDocStore::open(config.storage.data_dir.join("store.redb"))?);
        let catalog = Arc::new(Catalog::new(docstore.clone()));
        let embedder = Arc::new(TextEmbedder::new(provider));

        info!(dimension = expected, "opened engine");
        Ok(Self {
            data_dir: config.storage.data_dir.clone(),
            dimension: expected,
            config,
            docstore,
            catalog,
            embedder,
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// Opens an engine using the HTTP embedding provider built from
    /// `config.embedding`. Requires the `http-embedder` feature.
    #[cfg(feature = "http-embedder")]
    pub fn open_http(config: Config, base_url: impl Into<String>) -> Result<Self> {
        let provider = crate::embedding::http::HttpEmbedder::new(
            base_url,
            config.embedding.api_key.clone(),
            config.embedding.model,
        );
        Self::open(config, Box::new(provider))
    }

    /// The configuration this engine was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The vector width shared by every collection this engine manages.
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Creates a new, empty collection named `name`.
    ///
    /// Fails with [`EngineError::CollectionAlreadyExists`] if a collection
    /// with this name already exists, whether or not it is currently
    /// cached in this process.
    #[instrument(skip(self))]
    pub fn create(&self, name: &str) -> Result<Arc<Collection>> {
        let mut collections = self.collections.write().expect("lock poisoned");
        if collections.contains_key(name) || self.collection_exists(name)? {
            return Err(EngineError::CollectionAlreadyExists(name.to_string()));
        }

        // Force the backing store to materialize the (empty) collection so
        // a later `open` from a fresh process can tell it apart from one
        // that was never created.
        self.docstore.insert_many(name, Vec::new())?;

        let collection = Arc::new(self.recover(name)?);
        collections.insert(name.to_string(), collection.clone());
        info!(collection = name, "created collection");
        Ok(collection)
    }

    /// Returns the cached coordinator for `name`, or recovers and caches
    /// one if this is the first time this process has opened it.
    ///
    /// Fails with [`EngineError::CollectionNotFound`] if no collection
    /// with this name exists in the backing store.
    #[instrument(skip(self))]
    pub fn open(&self, name: &str) -> Result<Arc<Collection>> {
        if let Some(collection) = self.collections.read().expect("lock poisoned").get(name) {
            return Ok(collection.clone());
        }

        if !self.collection_exists(name)? {
            return Err(EngineError::CollectionNotFound(name.to_string()));
        }

        let recovered = Arc::new(self.recover(name)?);
        let mut collections = self.collections.write().expect("lock poisoned");
        let collection = collections
            .entry(name.to_string())
            .or_insert(recovered)
            .clone();
        Ok(collection)
    }

    /// Drops `name`: removes it (and its catalog row) from the backing
    /// store and discards any cached coordinator. Snapshot files already
    /// written to disk are left behind, orphaned, since the catalog row
    /// that referenced them is gone.
    #[instrument(skip(self))]
    pub fn drop(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().expect("lock poisoned");
        if let Some(collection) = collections.remove(name) {
            collection.drop_collection()?;
        } else {
            if !self.collection_exists(name)? {
                return Err(EngineError::CollectionNotFound(name.to_string()));
            }
            self.docstore.drop_collection(name)?;
            self.catalog.drop(name)?;
        }
        info!(collection = name, "dropped collection");
        Ok(())
    }

    /// Lists the names of every collection known to the backing store,
    /// excluding the reserved catalog collection.
    pub fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self
            .docstore
            .list_collections()?
            .into_iter()
            .filter(|name| name != META_COLLECTION)
            .collect())
    }

    fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.docstore.list_collections()?.iter().any(|c| c == name))
    }

    fn recover(&self, name: &str) -> Result<Collection> {
        Collection::open(
            name,
            self.dimension,
            self.embedder.clone(),
            self.docstore.clone(),
            self.catalog.clone(),
            &self.data_dir,
            self.config.hnsw,
        )
    }
}
