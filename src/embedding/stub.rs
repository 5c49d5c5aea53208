//! A deterministic, in-process embedding provider used by tests.
//!
//! Mirrors the `make_embedding(seed, dim)` helper the system this engine's
//! design was modeled on used inside its own vector-index tests, but
//! exposed as a real [`RawEmbedder`] so integration tests can exercise the
//! whole [`crate::engine::Engine`] without any network access.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::embedding::RawEmbedder;
use crate::error::Result;
use crate::types::Vector;

/// Embeds text by hashing it into a deterministic pseudo-random unit
/// vector. Two equal strings always produce the same vector; unrelated
/// strings are (with overwhelming probability) far apart under cosine
/// distance, which is enough for search tests that check relative ranking
/// without depending on a real model.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    dimension: u32,
}

impl StubEmbedder {
    /// Creates a stub embedder producing vectors of the given width.
    pub fn new(dimension: u32) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vector {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        make_embedding(seed, self.dimension as usize)
    }
}

impl RawEmbedder for StubEmbedder {
    fn embed_raw(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dimension(&self) -> u32 {
        self.dimension
    }
}

/// Deterministic pseudo-random unit vector from a `u64` seed, using a
/// simple xorshift generator so the crate does not need a `rand` dependency
/// just for test fixtures.
pub fn make_embedding(seed: u64, dim: usize) -> Vector {
    let mut state = seed.wrapping_mul(0x9E3779B97F4A7C15).max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut v: Vec<f32> = (0..dim)
        .map(|_| (next() as f64 / u64::MAX as f64) as f32 * 2.0 - 1.0)
        .collect();

    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}
