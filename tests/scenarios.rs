//! End-to-end scenarios against the public `Engine`/`Collection` API,
//! covering a single insert-query round trip, reopen-after-many-inserts
//! recovery, create/drop/recreate id resets, dimension-mismatch rejection,
//! and concurrent search during an ongoing insert.

use std::sync::Arc;

use kaerdb::docstore::Filter;
use kaerdb::embedding::stub::StubEmbedder;
use kaerdb::embedding::RawEmbedder;
use kaerdb::error::Result;
use kaerdb::types::{Document, Value, Vector};
use kaerdb::{Config, EmbeddingModel, Engine};

const DIM: u32 = 1024;

fn engine(dir: &std::path::Path) -> Engine {
    let mut config = Config::new(dir);
    config.embedding.api_key = "test-key".to_string();
    config.embedding.model = EmbeddingModel::Small;
    // Keep the graph small so tests involving hundreds of inserts stay fast.
    config.hnsw.m = 8;
    config.hnsw.ef_construction = 50;
    Engine::open(config, Box::new(StubEmbedder::new(DIM))).unwrap()
}

fn meta(pairs: &[(&str, Value)]) -> Document {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

// S1/S2 share a collection: "hello world" and "nihao shijie", queried with
// the query text equal to "hello world" so the stub embedder's hash-based
// vector gives a deterministic, unambiguous ranking (a real embedding model
// would place the two documents at a similar relative distance for a noisy
// variant of "hello world"; the stub has no notion of semantic similarity,
// so the test pins down the one case where ranking isn't a coin flip).
fn s1_s2_collection(dir: &std::path::Path) -> (Engine, Arc<kaerdb::Collection>) {
    let engine = engine(dir);
    let notes = engine.create("notes").unwrap();
    notes
        .insert(
            vec!["hello world".to_string(), "nihao shijie".to_string()],
            vec![
                meta(&[("attr1", Value::from(1))]),
                meta(&[("attr1", Value::from(200))]),
            ],
        )
        .unwrap();
    (engine, notes)
}

#[test]
fn s1_filtered_query_returns_exactly_the_matching_row() {
    let dir = tempfile::tempdir().unwrap();
    let (_engine, notes) = s1_s2_collection(dir.path());

    let hits = notes
        .query("hello world", 1, Filter::Eq("attr1".to_string(), Value::from(1)))
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 1);
    assert_eq!(hits[0].document, "hello world");
}

#[test]
fn s2_unfiltered_query_returns_both_rows_nearest_first() {
    let dir = tempfile::tempdir().unwrap();
    let (_engine, notes) = s1_s2_collection(dir.path());

    let hits = notes.query("hello world", 2, Filter::All).unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, 1);
    assert_eq!(hits[1].id, 2);
    assert!(hits[0].distance <= hits[1].distance);
}

#[test]
fn s3_reopen_after_many_inserts_preserves_query_results_and_next_id() {
    let dir = tempfile::tempdir().unwrap();
    let n = 1001u32;

    let before_hits = {
        let engine = engine(dir.path());
        let items = engine.create("items").unwrap();
        let docs: Vec<String> = (0..n).map(|i| format!("document {i}")).collect();
        let metas: Vec<Document> = (0..n).map(|_| Document::new()).collect();
        items.insert(docs, metas).unwrap();

        assert_eq!(items.next_id(), n);
        items.query("document 500", 3, Filter::All).unwrap()
        // `engine` and `items` drop here, releasing the redb file lock.
    };

    let index_dir = dir.path().join("index");
    let snapshots: Vec<_> = std::fs::read_dir(&index_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(snapshots, vec![format!("items_{n}.hnsw")]);

    let engine = engine(dir.path());
    let items = engine.open("items").unwrap();
    assert_eq!(items.next_id(), n);

    let after_hits = items.query("document 500", 3, Filter::All).unwrap();
    assert_eq!(before_hits, after_hits);
}

#[test]
fn s4_drop_then_recreate_restarts_ids_and_clears_the_catalog_row() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let notes = engine.create("notes").unwrap();
    let ids = notes.insert(vec!["a".into()], vec![Document::new()]).unwrap();
    assert_eq!(ids, vec![1]);

    engine.drop("notes").unwrap();
    // Between drop and re-create, the collection must not be resolvable at
    // all — the catalog row and the document store table are both gone.
    assert!(engine.open("notes").unwrap_err().is_not_found());

    let notes = engine.create("notes").unwrap();
    let ids = notes.insert(vec!["b".into()], vec![Document::new()]).unwrap();
    assert_eq!(ids, vec![1]);
}

/// Produces correctly-shaped vectors for every text except one "trigger"
/// text, for which it returns a vector one dimension short — simulating a
/// provider that misbehaves on a single call rather than being
/// uniformly broken (which would also break the query calls this test needs
/// to make afterward).
struct SometimesWrongEmbedder {
    inner: StubEmbedder,
    trigger: &'static str,
}

impl RawEmbedder for SometimesWrongEmbedder {
    fn embed_raw(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        let mut vectors = self.inner.embed_raw(texts)?;
        for (text, vector) in texts.iter().zip(vectors.iter_mut()) {
            if *text == self.trigger {
                vector.pop();
            }
        }
        Ok(vectors)
    }

    fn dimension(&self) -> u32 {
        self.inner.dimension()
    }
}

#[test]
fn s5_dimension_mismatch_is_rejected_with_no_partial_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(dir.path());
    config.embedding.api_key = "test-key".to_string();
    config.embedding.model = EmbeddingModel::Small;
    let provider = SometimesWrongEmbedder {
        inner: StubEmbedder::new(DIM),
        trigger: "boom",
    };
    let engine = Engine::open(config, Box::new(provider)).unwrap();
    let items = engine.create("items").unwrap();

    items.insert(vec!["first".into()], vec![Document::new()]).unwrap();

    let err = items
        .insert(vec!["boom".into()], vec![Document::new()])
        .unwrap_err();
    assert!(matches!(err, kaerdb::EngineError::IndexDimensionMismatch { .. }));

    // Nothing from the failed call reached the store: only the first,
    // successful row is still there.
    let hits = items.query("first", 10, Filter::All).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 1);
}

#[test]
fn s6_concurrent_search_during_add_finds_the_new_row_once_added() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let items = engine.create("items").unwrap();

    let seed_docs: Vec<String> = (0..50).map(|i| format!("seed document {i}")).collect();
    let seed_metas: Vec<Document> = (0..50).map(|_| Document::new()).collect();
    items.insert(seed_docs, seed_metas).unwrap();

    let reader_items = items.clone();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let items = reader_items.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    // Any query concurrent with the writer thread below must
                    // return without panicking and without an inconsistent
                    // (partially-linked) graph causing a dangling-edge panic.
                    let _ = items.query("seed document 10", 5, Filter::All).unwrap();
                }
            })
        })
        .collect();

    let writer_items = items.clone();
    let writer = std::thread::spawn(move || {
        for i in 0..20 {
            writer_items
                .insert(vec![format!("fresh document {i}")], vec![Document::new()])
                .unwrap();
        }
    });

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let hits = items.query("fresh document 19", 1, Filter::All).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document, "fresh document 19");
    assert!(hits[0].distance < 1e-4);
}
