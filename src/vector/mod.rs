//! The approximate nearest-neighbour index.
//!
//! Unlike the embedder and document store, the HNSW index is not exposed as
//! a trait: it is the engine's own core algorithm, not an external
//! collaborator to be swapped out, so [`HnswIndex`] is used directly by
//! [`crate::collection::Collection`].

mod hnsw;

pub use hnsw::HnswIndex;
