//! A hand-rolled HNSW (Hierarchical Navigable Small World) graph index.
//!
//! The graph is stored as a growable array of nodes indexed by id (slot `0`
//! is an unused sentinel, so ids start at `1`), with per-layer adjacency
//! lists held as plain `Vec<u32>`. There is no pointer graph: every
//! reference is an index into the node array, which keeps the structure
//! trivially `Send` and makes the binary snapshot format a direct dump of
//! the array.
//!
//! Concurrency follows a single-writer, many-readers discipline: [`add`]
//! and [`save`] take the index's internal [`RwLock`] for writing, while
//! [`search`] only needs a read lock and may run concurrently with other
//! searches.
//!
//! [`add`]: HnswIndex::add
//! [`save`]: HnswIndex::save
//! [`search`]: HnswIndex::search

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::RwLock;

use crate::error::{Result, SnapshotError};
use crate::types::GROW_BATCH;

const MAGIC: &[u8; 4] = b"HNSW";
const FORMAT_VERSION: u32 = 1;

/// A single graph node: its vector and, per occupied layer, the ids it is
/// connected to.
#[derive(Debug, Clone)]
struct Node {
    vector: Vec<f32>,
    /// `neighbors[l]` holds layer-`l` adjacency, for `l` in `0..=top_layer`.
    neighbors: Vec<Vec<u32>>,
}

struct HnswState {
    /// `nodes[0]` is always `None` (id `0` is never used); `nodes[id]` holds
    /// the node for `id` once inserted.
    nodes: Vec<Option<Node>>,
    entry_point: u32,
    entry_layer: u32,
    rng: u64,
}

/// An in-memory HNSW index over fixed-width `f32` vectors, using cosine
/// distance.
pub struct HnswIndex {
    dimension: u32,
    m: u32,
    mmax0: u32,
    ef_construction: u32,
    level_mult: f64,
    state: RwLock<HnswState>,
}

impl HnswIndex {
    /// Creates an empty index for vectors of the given width.
    pub fn new(dimension: u32, m: u32, ef_construction: u32) -> Self {
        Self {
            dimension,
            m,
            mmax0: m * 2,
            ef_construction,
            level_mult: 1.0 / (m.max(2) as f64).ln(),
            state: RwLock::new(HnswState {
                nodes: vec![None],
                entry_point: 0,
                entry_layer: 0,
                rng: 0x9E37_79B9_7F4A_7C15,
            }),
        }
    }

    /// Vector width this index accepts.
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Current node-array capacity (the largest id the array can hold
    /// without growing), used as the catalog's `size` field.
    pub fn capacity(&self) -> u32 {
        let state = self.read_state();
        state.nodes.len() as u32 - 1
    }

    /// Number of ids actually present in the index.
    pub fn len(&self) -> usize {
        self.read_state().nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Returns `true` if no id has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, HnswState> {
        self.state.read().expect("hnsw lock poisoned")
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, HnswState> {
        self.state.write().expect("hnsw lock poisoned")
    }

    /// Inserts `point` under `id`. `id` must be greater than `0` and must
    /// not already be present; `point.len()` must equal [`Self::dimension`].
    pub fn add(&self, point: &[f32], id: u32) {
        debug_assert!(id > 0, "id 0 is reserved");
        debug_assert_eq!(point.len(), self.dimension as usize);

        let mut state = self.write_state();
        grow_to(&mut state.nodes, id);

        let level = geometric_level(&mut state.rng, self.level_mult);
        let node = Node {
            vector: point.to_vec(),
            neighbors: vec![Vec::new(); level as usize + 1],
        };

        if state.entry_point == 0 {
            state.nodes[id as usize] = Some(node);
            state.entry_point = id;
            state.entry_layer = level;
            return;
        }

        let entry_point = state.entry_point;
        let entry_layer = state.entry_layer;
        state.nodes[id as usize] = Some(node);

        // Phase A: greedy descent from the entry point down to level+1.
        let mut cur = entry_point;
        for layer in ((level + 1)..=entry_layer).rev() {
            cur = greedy_descend(&state.nodes, cur, point, layer);
        }

        // Phase B: layer-local beam search + neighbour selection.
        let mut entry_candidates = vec![cur];
        for layer in (0..=level.min(entry_layer)).rev() {
            let cap = if layer == 0 { self.mmax0 } else { self.m } as usize;
            let candidates = search_layer(
                &state.nodes,
                point,
                &entry_candidates,
                self.ef_construction.max(cap as u32) as usize,
                layer,
            );
            let selected = select_neighbors(&state.nodes, point, &candidates, cap);

            for &nb in &selected {
                add_edge(&mut state.nodes, id, nb, layer);
                add_edge(&mut state.nodes, nb, id, layer);
            }
            for &nb in &selected {
                let cap_nb = if layer == 0 { self.mmax0 } else { self.m } as usize;
                let degree = state.nodes[nb as usize]
                    .as_ref()
                    .map(|n| n.neighbors[layer].len())
                    .unwrap_or(0);
                if degree > cap_nb {
                    prune_node(&mut state.nodes, nb, layer, cap_nb);
                }
            }
            entry_candidates = if selected.is_empty() {
                vec![cur]
            } else {
                selected
            };
        }

        if level > entry_layer {
            state.entry_point = id;
            state.entry_layer = level;
        }
    }

    /// Returns up to `k` `(id, distance)` pairs nearest to `query`, ascending
    /// by distance, restricted to ids for which `filter(id)` returns `true`.
    /// Pass `|_| true` for unfiltered search. `ef` is the beam width used at
    /// the ground layer; a larger value trades latency for recall.
    pub fn search(
        &self,
        query: &[f32],
        ef: usize,
        k: usize,
        filter: &dyn Fn(u32) -> bool,
    ) -> Vec<(u32, f32)> {
        let state = self.read_state();
        if state.entry_point == 0 || k == 0 {
            return Vec::new();
        }

        let mut cur = state.entry_point;
        for layer in (1..=state.entry_layer).rev() {
            cur = greedy_descend(&state.nodes, cur, query, layer);
        }

        let width = ef.max(k);
        let candidates = search_layer(&state.nodes, query, &[cur], width, 0);

        candidates
            .into_iter()
            .filter(|&id| filter(id))
            .take(k)
            .map(|id| {
                let dist = cosine_distance(query, &state.nodes[id as usize].as_ref().unwrap().vector);
                (id, dist)
            })
            .collect()
    }

    /// Writes a binary snapshot to `path`, atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let state = self.read_state();
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.m.to_le_bytes());
        buf.extend_from_slice(&self.mmax0.to_le_bytes());
        buf.extend_from_slice(&self.ef_construction.to_le_bytes());
        buf.extend_from_slice(&self.dimension.to_le_bytes());
        buf.extend_from_slice(&state.entry_point.to_le_bytes());
        buf.extend_from_slice(&state.entry_layer.to_le_bytes());
        let node_count = state.nodes.len() as u32 - 1;
        buf.extend_from_slice(&node_count.to_le_bytes());
        buf.extend_from_slice(&self.level_mult.to_le_bytes());

        for id in 1..=node_count {
            match &state.nodes[id as usize] {
                None => buf.push(0),
                Some(node) => {
                    buf.push(1);
                    let top_layer = node.neighbors.len() as u32 - 1;
                    buf.extend_from_slice(&top_layer.to_le_bytes());
                    for component in &node.vector {
                        buf.extend_from_slice(&component.to_le_bytes());
                    }
                    for layer_neighbors in &node.neighbors {
                        let degree = layer_neighbors.len() as u32;
                        buf.extend_from_slice(&degree.to_le_bytes());
                        for &nb in layer_neighbors {
                            buf.extend_from_slice(&nb.to_le_bytes());
                        }
                    }
                }
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Loads a binary snapshot previously written by [`Self::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut cursor = Cursor { bytes: &bytes, pos: 0 };

        let magic = cursor.take(4)?;
        if magic != MAGIC {
            return Err(SnapshotError::BadMagic.into());
        }
        let version = cursor.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version).into());
        }
        let m = cursor.read_u32()?;
        let mmax0 = cursor.read_u32()?;
        let ef_construction = cursor.read_u32()?;
        let dimension = cursor.read_u32()?;
        let entry_point = cursor.read_u32()?;
        let entry_layer = cursor.read_u32()?;
        let node_count = cursor.read_u32()?;
        let level_mult = cursor.read_f64()?;

        let mut nodes: Vec<Option<Node>> = vec![None; node_count as usize + 1];
        for id in 1..=node_count {
            let present = cursor.read_u8()?;
            if present == 0 {
                continue;
            }
            let top_layer = cursor.read_u32()?;
            let mut vector = Vec::with_capacity(dimension as usize);
            for _ in 0..dimension {
                vector.push(cursor.read_f32()?);
            }
            let mut neighbors = Vec::with_capacity(top_layer as usize + 1);
            for _ in 0..=top_layer {
                let degree = cursor.read_u32()?;
                let mut layer_neighbors = Vec::with_capacity(degree as usize);
                for _ in 0..degree {
                    layer_neighbors.push(cursor.read_u32()?);
                }
                neighbors.push(layer_neighbors);
            }
            nodes[id as usize] = Some(Node { vector, neighbors });
        }

        Ok(Self {
            dimension,
            m,
            mmax0,
            ef_construction,
            level_mult,
            state: RwLock::new(HnswState {
                nodes,
                entry_point,
                entry_layer,
                rng: 0x9E37_79B9_7F4A_7C15,
            }),
        })
    }
}

/// Cosine distance: `0.0` for identical direction, `2.0` for opposite. The
/// zero vector is treated as maximally distant from everything, including
/// itself, since it is reserved as an index sentinel and never a real
/// embedding.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    let cosine_similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    1.0 - cosine_similarity
}

fn grow_to(nodes: &mut Vec<Option<Node>>, id: u32) {
    while nodes.len() <= id as usize {
        let grown = nodes.len() + GROW_BATCH as usize;
        nodes.resize(grown, None);
    }
}

/// `ℓ = floor(-ln(U) * mL)` with `U` drawn uniformly from `(0, 1]`, using a
/// xorshift generator seeded once at index creation (or fixed on load).
fn geometric_level(rng: &mut u64, level_mult: f64) -> u32 {
    let mut state = *rng;
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    *rng = state;
    let u = ((state >> 11) as f64 + 1.0) / ((1u64 << 53) as f64 + 1.0);
    (-u.ln() * level_mult).floor() as u32
}

fn node_vector(nodes: &[Option<Node>], id: u32) -> &[f32] {
    &nodes[id as usize].as_ref().expect("dangling graph edge").vector
}

fn greedy_descend(nodes: &[Option<Node>], start: u32, point: &[f32], layer: usize) -> u32 {
    let mut best = start;
    let mut best_dist = cosine_distance(point, node_vector(nodes, best));
    loop {
        let mut improved = false;
        if let Some(node) = &nodes[best as usize] {
            if layer < node.neighbors.len() {
                for &nb in &node.neighbors[layer] {
                    let d = cosine_distance(point, node_vector(nodes, nb));
                    if d < best_dist {
                        best_dist = d;
                        best = nb;
                        improved = true;
                    }
                }
            }
        }
        if !improved {
            return best;
        }
    }
}

#[derive(Clone, Copy)]
struct Scored {
    dist: f32,
    id: u32,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.id == other.id
    }
}
impl Eq for Scored {}
impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(Ordering::Equal)
    }
}

/// Best-first search within a single layer, returning up to `ef` ids
/// ascending by distance to `point`.
fn search_layer(
    nodes: &[Option<Node>],
    point: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
) -> Vec<u32> {
    use std::cmp::Reverse;

    let mut visited: HashSet<u32> = HashSet::new();
    let mut candidates: BinaryHeap<Reverse<Scored>> = BinaryHeap::new();
    let mut results: BinaryHeap<Scored> = BinaryHeap::new();

    for &ep in entry_points {
        if nodes[ep as usize].is_none() {
            continue;
        }
        if visited.insert(ep) {
            let d = cosine_distance(point, node_vector(nodes, ep));
            candidates.push(Reverse(Scored { dist: d, id: ep }));
            results.push(Scored { dist: d, id: ep });
        }
    }

    while let Some(Reverse(current)) = candidates.pop() {
        if let Some(worst) = results.peek() {
            if results.len() >= ef && current.dist > worst.dist {
                break;
            }
        }
        if let Some(node) = &nodes[current.id as usize] {
            if layer < node.neighbors.len() {
                for &nb in &node.neighbors[layer] {
                    if !visited.insert(nb) {
                        continue;
                    }
                    let d = cosine_distance(point, node_vector(nodes, nb));
                    let should_add = results.len() < ef
                        || results.peek().map(|w| d < w.dist).unwrap_or(true);
                    if should_add {
                        candidates.push(Reverse(Scored { dist: d, id: nb }));
                        results.push(Scored { dist: d, id: nb });
                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }
        }
    }

    results.into_sorted_vec().into_iter().map(|s| s.id).collect()
}

/// Diverse-direction neighbour selection: keeps `c` only if it is closer to
/// `query` than to every neighbour already kept, stopping once `cap`
/// neighbours are kept.
fn select_neighbors(
    nodes: &[Option<Node>],
    query: &[f32],
    candidates_ascending: &[u32],
    cap: usize,
) -> Vec<u32> {
    let mut selected: Vec<u32> = Vec::with_capacity(cap);
    for &c in candidates_ascending {
        if selected.len() >= cap {
            break;
        }
        let dist_c_q = cosine_distance(query, node_vector(nodes, c));
        let keep = selected
            .iter()
            .all(|&r| dist_c_q < cosine_distance(node_vector(nodes, c), node_vector(nodes, r)));
        if keep {
            selected.push(c);
        }
    }
    selected
}

fn add_edge(nodes: &mut [Option<Node>], from: u32, to: u32, layer: usize) {
    if let Some(node) = &mut nodes[from as usize] {
        if layer < node.neighbors.len() && !node.neighbors[layer].contains(&to) {
            node.neighbors[layer].push(to);
        }
    }
}

fn prune_node(nodes: &mut [Option<Node>], id: u32, layer: usize, cap: usize) {
    let (old, point) = match &nodes[id as usize] {
        Some(node) => (node.neighbors[layer].clone(), node.vector.clone()),
        None => return,
    };

    let mut scored: Vec<Scored> = old
        .iter()
        .map(|&n| Scored {
            dist: cosine_distance(&point, node_vector(nodes, n)),
            id: n,
        })
        .collect();
    scored.sort();
    let candidates: Vec<u32> = scored.into_iter().map(|s| s.id).collect();
    let kept = select_neighbors(nodes, &point, &candidates, cap);
    let kept_set: HashSet<u32> = kept.iter().copied().collect();

    for &n in &old {
        if !kept_set.contains(&n) {
            if let Some(node) = &mut nodes[n as usize] {
                if layer < node.neighbors.len() {
                    node.neighbors[layer].retain(|&x| x != id);
                }
            }
        }
    }
    if let Some(node) = &mut nodes[id as usize] {
        node.neighbors[layer] = kept;
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(SnapshotError::Truncated.into());
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.take(8)?;
        Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
    }
}
