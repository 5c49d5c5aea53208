//! Feeds arbitrary bytes to `HnswIndex::load` as if they were a snapshot
//! file read from disk. The loader must reject malformed input with an
//! error, never panic — snapshot files are untrusted once you consider a
//! truncated write, a disk error, or a file from an incompatible version.

#![no_main]

use libfuzzer_sys::fuzz_target;
use kaerdb::vector::HnswIndex;

fuzz_target!(|data: &[u8]| {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.hnsw");
    if std::fs::write(&path, data).is_err() {
        return;
    }
    let _ = HnswIndex::load(&path);
});
