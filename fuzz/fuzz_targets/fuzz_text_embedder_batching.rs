//! Feeds arbitrary (possibly invalid-as-originally-encoded, always lossily
//! converted to UTF-8) text through `TextEmbedder::embed` with a trivial
//! always-succeeding provider, varying the number and length of texts so
//! the MAX_BATCH/MAX_TEXT_LEN boundaries (and multi-byte characters sitting
//! right on the truncation boundary) get exercised. The adapter must always
//! return exactly one vector per input text, in order, and never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use kaerdb::embedding::{RawEmbedder, TextEmbedder};
use kaerdb::error::Result;
use kaerdb::types::Vector;

struct AlwaysOk;

impl RawEmbedder for AlwaysOk {
    fn embed_raw(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        Ok(texts.iter().map(|t| vec![t.chars().count() as f32]).collect())
    }

    fn dimension(&self) -> u32 {
        1
    }
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(data).to_string();
    // Vary the fan-out using the data length itself so both sub-MAX_BATCH
    // and multi-batch (>96) calls get covered.
    let count = (data.len() % 200) + 1;
    let texts: Vec<String> = (0..count).map(|_| text.clone()).collect();

    let embedder = TextEmbedder::new(Box::new(AlwaysOk));
    let result = embedder.embed(&texts).unwrap();
    assert_eq!(result.len(), texts.len());
});
