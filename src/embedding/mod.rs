//! Embedding provider abstractions.
//!
//! This module provides the trait and batching adapter for turning text into
//! dense vectors. Two things are layered here:
//!
//! - [`RawEmbedder`]: a single round trip to a provider, which accepts at
//!   most [`MAX_BATCH`] texts of at most [`MAX_TEXT_LEN`] characters each.
//! - [`TextEmbedder`]: the adapter the rest of the engine calls. It splits
//!   an arbitrary-length input into `ceil(n / MAX_BATCH)` sequential calls
//!   to a [`RawEmbedder`] and truncates any text over [`MAX_TEXT_LEN`]
//!   characters before sending it, concatenating results in input order.
//!
//! # Providers
//!
//! - [`http::HttpEmbedder`] — calls a remote HTTP embedding endpoint
//!   (requires the `http-embedder` feature).
//! - [`stub::StubEmbedder`] — deterministic, in-process, for tests.

#[cfg(feature = "http-embedder")]
pub mod http;
pub mod stub;

use crate::error::{EmbedderError, Result};
use crate::types::Vector;

/// Maximum number of texts a [`RawEmbedder`] accepts in a single call,
/// matching the limit of the provider this engine's design was modeled on.
pub const MAX_BATCH: usize = 96;

/// Maximum character length of a single text passed to a [`RawEmbedder`].
/// Longer texts are truncated by the [`TextEmbedder`] adapter before the
/// call is made.
pub const MAX_TEXT_LEN: usize = 512;

/// A single round trip to an embedding provider.
///
/// Implementations may assume the caller (the [`TextEmbedder`] adapter)
/// never passes more than [`MAX_BATCH`] texts, each already truncated to at
/// most [`MAX_TEXT_LEN`] characters.
pub trait RawEmbedder: Send + Sync {
    /// Embeds a batch of texts, returning one vector per input text in the
    /// same order.
    fn embed_raw(&self, texts: &[&str]) -> Result<Vec<Vector>>;

    /// The vector width this provider produces.
    fn dimension(&self) -> u32;
}

/// The embedding adapter used by the rest of the engine.
///
/// Wraps a [`RawEmbedder`] and enforces the batching and length contract
/// from the engine's interface: arbitrary-length input is split into
/// sequential sub-batches of at most [`MAX_BATCH`] texts, and each text is
/// truncated to [`MAX_TEXT_LEN`] characters. A failure in any sub-batch
/// aborts the whole call; no partial result is returned.
pub struct TextEmbedder {
    provider: Box<dyn RawEmbedder>,
}

impl TextEmbedder {
    /// Wraps a raw provider in the batching adapter.
    pub fn new(provider: Box<dyn RawEmbedder>) -> Self {
        Self { provider }
    }

    /// The vector width produced by the wrapped provider.
    pub fn dimension(&self) -> u32 {
        self.provider.dimension()
    }

    /// Embeds a sequence of texts, batching and truncating as needed.
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<&str> = texts
            .iter()
            .map(|text| truncate_chars(text, MAX_TEXT_LEN))
            .collect();

        let mut out = Vec::with_capacity(texts.len());
        for chunk in truncated.chunks(MAX_BATCH) {
            if chunk.len() > MAX_BATCH {
                return Err(EmbedderError::TooManyTexts {
                    count: chunk.len(),
                    max: MAX_BATCH,
                }
                .into());
            }
            let mut vectors = self.provider.embed_raw(chunk)?;
            out.append(&mut vectors);
        }
        Ok(out)
    }
}

/// Truncates `text` to at most `max_chars` Unicode scalar values, returning
/// a `&str` slice (never splitting a multi-byte character).
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        dimension: u32,
        calls: AtomicUsize,
        max_batch_seen: AtomicUsize,
    }

    impl RawEmbedder for CountingProvider {
        fn embed_raw(&self, texts: &[&str]) -> Result<Vec<Vector>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.max_batch_seen
                .fetch_max(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|_| vec![0.0; self.dimension as usize])
                .collect())
        }

        fn dimension(&self) -> u32 {
            self.dimension
        }
    }

    #[test]
    fn splits_into_max_batch_sized_chunks() {
        let provider = CountingProvider {
            dimension: 4,
            calls: AtomicUsize::new(0),
            max_batch_seen: AtomicUsize::new(0),
        };
        let texts: Vec<String> = (0..200).map(|i| format!("text {i}")).collect();
        let embedder = TextEmbedder::new(Box::new(provider));
        let result = embedder.embed(&texts).unwrap();

        assert_eq!(result.len(), 200);
    }

    #[test]
    fn empty_input_makes_no_calls() {
        let provider = CountingProvider {
            dimension: 4,
            calls: AtomicUsize::new(0),
            max_batch_seen: AtomicUsize::new(0),
        };
        let embedder = TextEmbedder::new(Box::new(provider));
        let result = embedder.embed(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn truncates_long_text_before_embedding() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn preserves_input_order_across_batches() {
        struct EchoingProvider;
        impl RawEmbedder for EchoingProvider {
            fn embed_raw(&self, texts: &[&str]) -> Result<Vec<Vector>> {
                Ok(texts
                    .iter()
                    .map(|t| vec![t.len() as f32])
                    .collect())
            }
            fn dimension(&self) -> u32 {
                1
            }
        }
        let texts: Vec<String> = (0..150).map(|i| "x".repeat(i % 10)).collect();
        let embedder = TextEmbedder::new(Box::new(EchoingProvider));
        let result = embedder.embed(&texts).unwrap();
        for (i, text) in texts.iter().enumerate() {
            assert_eq!(result[i][0], text.len() as f32);
        }
    }
}
