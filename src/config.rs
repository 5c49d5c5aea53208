//! Configuration types for the engine.
//!
//! The [`Config`] struct controls three groups of settings: the embedding
//! provider, the on-disk data directory, and the HNSW build/search
//! parameters.
//!
//! # Example
//! ```rust
//! use kaerdb::{Config, EmbeddingModel};
//!
//! let config = Config {
//!     embedding: kaerdb::EmbeddingConfig {
//!         api_key: "key".to_string(),
//!         model: EmbeddingModel::Small,
//!     },
//!     ..Config::new("./data")
//! };
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Top-level engine configuration: embedding provider, storage location,
/// and HNSW tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// On-disk storage settings.
    pub storage: StorageConfig,
    /// HNSW build/search parameters.
    pub hnsw: HnswConfig,
}

impl Config {
    /// Creates a configuration pointed at `data_dir`, with the default
    /// embedding model and HNSW parameters. Callers typically still need to
    /// set `embedding.api_key`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            storage: StorageConfig {
                data_dir: data_dir.into(),
            },
            hnsw: HnswConfig::default(),
        }
    }

    /// Loads a configuration from a TOML file on disk.
    ///
    /// Mirrors the configuration file this engine's design was modeled on,
    /// which loaded `{cohere, db, hnsw}` sections from TOML at startup.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|err| EngineError::config(err.to_string()))
    }

    /// Validates the configuration, returning [`EngineError::Config`] on the
    /// first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.hnsw.m == 0 {
            return Err(EngineError::config("hnsw.m must be greater than 0"));
        }
        if self.hnsw.ef_construction == 0 {
            return Err(EngineError::config(
                "hnsw.ef_construction must be greater than 0",
            ));
        }
        if self.embedding.api_key.trim().is_empty() {
            return Err(EngineError::config("embedding.api_key must not be empty"));
        }
        Ok(())
    }
}

/// Embedding provider settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API key for the remote embedding provider.
    pub api_key: String,
    /// Which embedding model (and therefore which vector dimension) to use.
    pub model: EmbeddingModel,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: EmbeddingModel::default(),
        }
    }
}

/// On-disk storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the document store database file and HNSW
    /// snapshot files (`<data_dir>/store.redb`, `<data_dir>/index/`).
    pub data_dir: PathBuf,
}

/// HNSW build and search parameters.
///
/// Defaults (`m = 32`, `ef_construction = 400`) come from the system this
/// engine's design was modeled on, not from general-purpose HNSW tuning
/// advice; they trade build time for recall at a scale of up to a few
/// hundred thousand vectors per collection.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Target out-degree per non-ground layer (`Mmax0 = 2*m` at layer 0).
    pub m: u32,
    /// Candidate list width used while building the graph.
    pub ef_construction: u32,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 32,
            ef_construction: 400,
        }
    }
}

/// Named embedding models and the vector width each one produces.
///
/// A closed enum rather than a runtime string-keyed table (as in the system
/// this engine's design was modeled on) so an unknown model is a compile
/// error, not a runtime lookup miss.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingModel {
    /// 768-dimensional multilingual model.
    #[serde(rename = "multilingual-22-12")]
    Multilingual2212,
    /// 1024-dimensional model.
    Small,
    /// 4096-dimensional model.
    Large,
}

impl Default for EmbeddingModel {
    fn default() -> Self {
        Self::Small
    }
}

impl EmbeddingModel {
    /// Returns the vector width this model produces.
    pub fn dimension(&self) -> u32 {
        match self {
            Self::Multilingual2212 => 768,
            Self::Small => 1024,
            Self::Large => 4096,
        }
    }

    /// The provider-facing model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Multilingual2212 => "multilingual-22-12",
            Self::Small => "small",
            Self::Large => "large",
        }
    }
}
