//! Property-based tests for the invariants the HNSW index and the
//! collection coordinator are expected to uphold regardless of insertion
//! order or graph shape: monotonic id assignment, filter soundness and
//! (weak) completeness, graph symmetry, the per-layer degree bound,
//! snapshot round-tripping, and recovery equivalence across a close/reopen
//! cycle.

use std::collections::HashSet;

use proptest::prelude::*;

use kaerdb::docstore::Filter;
use kaerdb::embedding::stub::{make_embedding, StubEmbedder};
use kaerdb::types::{Document, Value};
use kaerdb::vector::HnswIndex;
use kaerdb::{Config, EmbeddingModel, Engine};

const DIM: u32 = 8;

fn engine(dir: &std::path::Path) -> Engine {
    let mut config = Config::new(dir);
    config.embedding.api_key = "test-key".to_string();
    config.embedding.model = EmbeddingModel::Small;
    config.hnsw.m = 8;
    config.hnsw.ef_construction = 50;
    Engine::open(config, Box::new(StubEmbedder::new(1024))).unwrap()
}

fn hnsw_with(n: u32, dim: u32) -> HnswIndex {
    let index = HnswIndex::new(dim, 8, 50);
    for id in 1..=n {
        index.add(&make_embedding(id as u64, dim as usize), id);
    }
    index
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // P1: after n successful inserts into an empty collection, the set of
    // assigned ids is exactly {1..=n}.
    #[test]
    fn p1_monotonic_ids(n in 1u32..200) {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let items = engine.create("items").unwrap();

        let docs: Vec<String> = (0..n).map(|i| format!("doc {i}")).collect();
        let metas: Vec<Document> = (0..n).map(|_| Document::new()).collect();
        let ids = items.insert(docs, metas).unwrap();

        let expected: HashSet<u32> = (1..=n).collect();
        let got: HashSet<u32> = ids.into_iter().collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(items.next_id(), n);
    }

    // P3: every id a filtered query returns satisfies the filter when the
    // stored row is re-evaluated against it directly.
    #[test]
    fn p3_filter_soundness(
        values in prop::collection::vec(0i64..50, 1..80),
        threshold in 0i64..50,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let items = engine.create("items").unwrap();

        let docs: Vec<String> = values.iter().enumerate().map(|(i, _)| format!("doc {i}")).collect();
        let metas: Vec<Document> = values
            .iter()
            .map(|v| {
                let mut doc = Document::new();
                doc.insert("n".to_string(), Value::from(*v));
                doc
            })
            .collect();
        items.insert(docs, metas).unwrap();

        let filter = Filter::Gte("n".to_string(), Value::from(threshold));
        let hits = items.query("doc 0", values.len(), filter.clone()).unwrap();
        for hit in &hits {
            prop_assert!(filter.matches(&hit.metadata));
        }
    }

    // Every inserted id is independently findable: searching with its own
    // vector and a beam wide enough to cover the whole graph returns it as
    // the (distance-zero) top hit. This would fail if pruning ever orphaned
    // a node from the connected component containing the entry point — the
    // externally-visible half of what P5/P6 guard against internally (the
    // raw edge-list symmetry and degree-cap checks live in
    // `vector::hnsw`'s own unit tests, which have access to the graph's
    // private state).
    #[test]
    fn every_inserted_id_is_findable_by_its_own_vector(n in 1u32..250, dim in 2u32..16) {
        let index = hnsw_with(n, dim);
        for id in 1..=n {
            let vector = make_embedding(id as u64, dim as usize);
            let hits = index.search(&vector, (n as usize).max(50), 1, &|_| true);
            prop_assert_eq!(hits.first().map(|&(found, _)| found), Some(id));
        }
    }

    // P7: loading a saved snapshot returns identical search results to the
    // live index it was saved from, for the same query.
    #[test]
    fn p7_snapshot_round_trip(n in 1u32..250, query_seed in 0u64..10_000) {
        let dim = 12;
        let index = hnsw_with(n, dim);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.hnsw");
        index.save(&path).unwrap();
        let loaded = HnswIndex::load(&path).unwrap();

        let query = make_embedding(query_seed, dim as usize);
        let before = index.search(&query, 100, 10, &|_| true);
        let after = loaded.search(&query, 100, 10, &|_| true);
        prop_assert_eq!(before, after);
    }
}

// P2 (recall sanity) and P8 (recovery equivalence) are statistical/
// lifecycle claims that don't fit proptest's shrinking model well, so they
// are expressed as direct tests instead.

// P4: filter completeness (weak form). With ef = 10*k and a small set of
// rows satisfying the filter — well under ef and all reachable from the
// entry point in a graph this small — a filtered query must return all of
// them, not just a subset.
#[test]
fn p4_filter_completeness_for_a_small_matching_set() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let items = engine.create("items").unwrap();

    let n = 100u32;
    let docs: Vec<String> = (0..n).map(|i| format!("doc {i}")).collect();
    let metas: Vec<Document> = (0..n)
        .map(|i| {
            let mut doc = Document::new();
            // Only 5 of 100 rows match; comfortably under ef = 10*k for any
            // k >= 1.
            doc.insert("tag".to_string(), Value::from(if i % 20 == 0 { "match" } else { "other" }));
            doc
        })
        .collect();
    items.insert(docs, metas).unwrap();

    let k = 5;
    let hits = items
        .query("doc 0", k, Filter::Eq("tag".to_string(), Value::from("match")))
        .unwrap();
    assert_eq!(hits.len(), 5);
}

#[test]
fn p2_recall_sanity_over_many_trials() {
    let dim = 16;
    let n = 2000u32;
    let index = hnsw_with(n, dim);

    let trials = 300;
    let mut exact_top1 = 0;
    for seed in 0..trials {
        // Query with the exact vector of an inserted point: the true top-1
        // is that point itself.
        let target_id = (seed % n) + 1;
        let query = make_embedding(target_id as u64, dim as usize);
        let hits = index.search(&query, 200, 10, &|_| true);
        if hits.first().map(|&(id, _)| id) == Some(target_id) {
            exact_top1 += 1;
        }
    }

    let recall = exact_top1 as f64 / trials as f64;
    assert!(recall >= 0.95, "top-1 recall {recall} below the 0.95 floor");
}

#[test]
fn p8_recovery_equivalence_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let n = 500u32;

    let live_hits = {
        let engine = engine(dir.path());
        let items = engine.create("items").unwrap();
        let docs: Vec<String> = (0..n).map(|i| format!("doc {i}")).collect();
        let metas: Vec<Document> = (0..n).map(|_| Document::new()).collect();
        items.insert(docs, metas).unwrap();

        let mut all = Vec::new();
        for i in [0u32, 123, 499] {
            all.push(items.query(&format!("doc {i}"), 5, Filter::All).unwrap());
        }
        all
    };

    let engine = engine(dir.path());
    let items = engine.open("items").unwrap();
    let mut reopened_hits = Vec::new();
    for i in [0u32, 123, 499] {
        reopened_hits.push(items.query(&format!("doc {i}"), 5, Filter::All).unwrap());
    }

    assert_eq!(live_hits, reopened_hits);
}
