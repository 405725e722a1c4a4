//! In-memory HNSW approximate nearest-neighbor graph over embedding
//! vectors, with file persistence. Authoritative index for large-scale
//! semantic search; small corpora fall back to [`crate::store::EmbeddingStore::search`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use cortex_core::config::defaults::{HNSW_FORMAT_VERSION, HNSW_MAGIC};
use cortex_core::config::HnswConfig;
use cortex_core::errors::{CortexError, CortexResult};

use crate::prng::Prng;

/// Cosine distance `1 - cos(a, b)` in `[0, 2]`. Mismatched lengths or a
/// zero-norm vector return `2.0` (maximally distant).
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        norm_a += *x as f64 * *x as f64;
        norm_b += *y as f64 * *y as f64;
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    id: i64,
    vector: Vec<f32>,
    max_level: usize,
    /// Neighbor lists, one per layer `0..=max_level`, as internal indices.
    neighbors: Vec<Vec<usize>>,
}

/// Max-heap-by-distance candidate, used as a min-heap via reversed `Ord`
/// (nearest first out of a `BinaryHeap::pop`).
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.distance.partial_cmp(&self.distance).unwrap_or(Ordering::Equal)
    }
}

/// A true max-heap-by-distance, used to track the farthest of the current
/// best `ef` results so it can be evicted when a closer candidate is found.
#[derive(Debug, Clone, Copy)]
struct Farthest {
    distance: f64,
    index: usize,
}
impl PartialEq for Farthest {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for Farthest {}
impl PartialOrd for Farthest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Farthest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.partial_cmp(&other.distance).unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: i64,
    pub distance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswIndex {
    nodes: Vec<Node>,
    id_to_index: HashMap<i64, usize>,
    entry_point: Option<usize>,
    config: HnswConfig,
    prng: Prng,
}

impl HnswIndex {
    pub fn new(config: HnswConfig) -> Self {
        let seed = config.seed;
        Self {
            nodes: Vec::new(),
            id_to_index: HashMap::new(),
            entry_point: None,
            config,
            prng: Prng::new(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn draw_level(&mut self) -> usize {
        let u = self.prng.next_unit_f64();
        (-u.ln() * self.config.level_mult()).floor() as usize
    }

    /// Inserts `(id, vector)`. A no-op if `id` already exists.
    pub fn insert(&mut self, id: i64, vector: Vec<f32>) {
        if self.id_to_index.contains_key(&id) {
            return;
        }

        let level = self.draw_level();

        if self.nodes.is_empty() {
            let node = Node {
                id,
                vector,
                max_level: level,
                neighbors: vec![Vec::new(); level + 1],
            };
            self.nodes.push(node);
            self.id_to_index.insert(id, 0);
            self.entry_point = Some(0);
            return;
        }

        let new_index = self.nodes.len();
        let mut entry = self.entry_point.unwrap();
        let max_level = self.nodes[entry].max_level;

        // Greedy descend from entry point down to level+1.
        let mut current = entry;
        if max_level > level {
            for layer in (level + 1..=max_level).rev() {
                current = self.greedy_descend(current, layer, &vector);
            }
        }
        entry = current;

        let mut neighbors = vec![Vec::new(); level + 1];
        let start_layer = level.min(max_level);
        for layer in (0..=start_layer).rev() {
            let candidates = self.beam_search(entry, layer, &vector, self.config.ef_construction);
            let cap = if layer == 0 { self.config.m_max0() } else { self.config.m() };
            let chosen: Vec<usize> = candidates.iter().take(cap).map(|c| c.1).collect();
            neighbors[layer] = chosen.clone();

            for &neighbor_idx in &chosen {
                let neighbor_layer_len = self.nodes[neighbor_idx].neighbors.len();
                if neighbor_layer_len <= layer {
                    continue;
                }
                self.nodes[neighbor_idx].neighbors[layer].push(new_index);
                let neighbor_cap = if layer == 0 { self.config.m_max0() } else { self.config.m() };
                if self.nodes[neighbor_idx].neighbors[layer].len() > neighbor_cap {
                    self.prune_neighbors(neighbor_idx, layer, neighbor_cap);
                }
            }

            if let Some(&closest) = candidates.first().map(|c| &c.1) {
                entry = closest;
            }
        }

        self.nodes.push(Node {
            id,
            vector,
            max_level: level,
            neighbors,
        });
        self.id_to_index.insert(id, new_index);

        if level > max_level {
            self.entry_point = Some(new_index);
        }
    }

    fn prune_neighbors(&mut self, node_idx: usize, layer: usize, cap: usize) {
        let vector = self.nodes[node_idx].vector.clone();
        let mut scored: Vec<(f64, usize)> = self.nodes[node_idx].neighbors[layer]
            .iter()
            .map(|&idx| (cosine_distance(&vector, &self.nodes[idx].vector), idx))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        scored.truncate(cap);
        self.nodes[node_idx].neighbors[layer] = scored.into_iter().map(|(_, idx)| idx).collect();
    }

    /// Moves greedily from `start` at `layer` to the closest node to `query`,
    /// stopping at a local fixed point.
    fn greedy_descend(&self, start: usize, layer: usize, query: &[f32]) -> usize {
        let mut current = start;
        let mut current_dist = cosine_distance(query, &self.nodes[current].vector);
        loop {
            let mut moved = false;
            if layer < self.nodes[current].neighbors.len() {
                for &neighbor in &self.nodes[current].neighbors[layer] {
                    let d = cosine_distance(query, &self.nodes[neighbor].vector);
                    if d < current_dist {
                        current = neighbor;
                        current_dist = d;
                        moved = true;
                    }
                }
            }
            if !moved {
                return current;
            }
        }
    }

    /// Beam search at `layer` starting from `entry`, width `ef`. Returns
    /// `(distance, index)` pairs sorted ascending by distance.
    fn beam_search(&self, entry: usize, layer: usize, query: &[f32], ef: usize) -> Vec<(f64, usize)> {
        let mut visited: HashSet<usize> = HashSet::new();
        visited.insert(entry);

        let entry_dist = cosine_distance(query, &self.nodes[entry].vector);
        let mut frontier: BinaryHeap<Candidate> = BinaryHeap::new();
        frontier.push(Candidate { distance: entry_dist, index: entry });

        let mut results: BinaryHeap<Farthest> = BinaryHeap::new();
        results.push(Farthest { distance: entry_dist, index: entry });

        while let Some(Candidate { distance, index }) = frontier.pop() {
            if results.len() >= ef {
                if let Some(farthest) = results.peek() {
                    if distance > farthest.distance {
                        break;
                    }
                }
            }

            if layer >= self.nodes[index].neighbors.len() {
                continue;
            }
            for &neighbor in &self.nodes[index].neighbors[layer] {
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = cosine_distance(query, &self.nodes[neighbor].vector);
                if results.len() < ef {
                    frontier.push(Candidate { distance: d, index: neighbor });
                    results.push(Farthest { distance: d, index: neighbor });
                } else if let Some(&farthest) = results.peek() {
                    if d < farthest.distance {
                        frontier.push(Candidate { distance: d, index: neighbor });
                        results.push(Farthest { distance: d, index: neighbor });
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<(f64, usize)> = results.into_iter().map(|f| (f.distance, f.index)).collect();
        out.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        out
    }

    /// Returns up to `k` nearest neighbors to `query`, sorted by distance
    /// ascending. `ef` is clamped to at least `k`.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Vec<SearchHit> {
        if self.nodes.is_empty() {
            return Vec::new();
        }
        let ef = ef.max(k);
        let entry = self.entry_point.unwrap();
        let max_level = self.nodes[entry].max_level;

        let mut current = entry;
        if max_level >= 1 {
            for layer in (1..=max_level).rev() {
                current = self.greedy_descend(current, layer, query);
            }
        }

        let candidates = self.beam_search(current, 0, query, ef);
        candidates
            .into_iter()
            .take(k)
            .map(|(distance, idx)| SearchHit {
                id: self.nodes[idx].id,
                distance,
            })
            .collect()
    }

    /// Serializes the whole graph (nodes, id map, entry point, parameters,
    /// PRNG state) to `path`, prefixed with a magic header.
    pub fn save(&self, path: &Path) -> CortexResult<()> {
        let json = serde_json::to_vec(self).map_err(CortexError::Serde)?;
        let mut file = File::create(path).map_err(CortexError::Io)?;
        file.write_all(HNSW_MAGIC).map_err(CortexError::Io)?;
        file.write_all(&HNSW_FORMAT_VERSION.to_le_bytes()).map_err(CortexError::Io)?;
        file.write_all(&json).map_err(CortexError::Io)?;
        Ok(())
    }

    /// Round-trips a graph previously written by [`Self::save`]. Fails with
    /// `InvalidMagic` if the header doesn't match, or `UnsupportedVersion` if
    /// the format version postdates this build.
    pub fn load(path: &Path) -> CortexResult<Self> {
        let mut file = File::open(path).map_err(CortexError::Io)?;
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic).map_err(CortexError::Io)?;
        if &magic != HNSW_MAGIC {
            return Err(CortexError::InvalidMagic);
        }
        let mut version_bytes = [0u8; 4];
        file.read_exact(&mut version_bytes).map_err(CortexError::Io)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != HNSW_FORMAT_VERSION {
            return Err(CortexError::UnsupportedVersion(version));
        }
        let mut rest = Vec::new();
        file.read_to_end(&mut rest).map_err(CortexError::Io)?;
        serde_json::from_slice(&rest).map_err(CortexError::Serde)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> HnswConfig {
        HnswConfig {
            m: 4,
            ef_construction: 32,
            ef_search: 16,
            seed: 42,
        }
    }

    #[test]
    fn empty_index_search_returns_empty() {
        let index = HnswIndex::new(cfg());
        assert!(index.search(&[1.0, 0.0], 5, 10).is_empty());
    }

    #[test]
    fn insert_is_noop_for_existing_id() {
        let mut index = HnswIndex::new(cfg());
        index.insert(1, vec![1.0, 0.0]);
        index.insert(1, vec![0.0, 1.0]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn search_finds_nearest_vector() {
        let mut index = HnswIndex::new(cfg());
        for i in 0..50i64 {
            let angle = i as f32 * 0.1;
            index.insert(i, vec![angle.cos(), angle.sin()]);
        }
        index.insert(100, vec![1.0, 0.0]);

        let hits = index.search(&[1.0, 0.0], 1, 32);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 100);
        assert!(hits[0].distance < 0.01);
    }

    #[test]
    fn search_respects_k() {
        let mut index = HnswIndex::new(cfg());
        for i in 0..20i64 {
            index.insert(i, vec![i as f32, 0.0]);
        }
        let hits = index.search(&[0.0, 0.0], 5, 20);
        assert_eq!(hits.len(), 5);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn save_and_load_round_trips() {
        let mut index = HnswIndex::new(cfg());
        for i in 0..10i64 {
            index.insert(i, vec![i as f32, (i * 2) as f32]);
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.hnsw");
        index.save(&path).unwrap();

        let loaded = HnswIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), index.len());
        let hits_before = index.search(&[3.0, 6.0], 3, 20);
        let hits_after = loaded.search(&[3.0, 6.0], 3, 20);
        assert_eq!(
            hits_before.iter().map(|h| h.id).collect::<Vec<_>>(),
            hits_after.iter().map(|h| h.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn load_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.hnsw");
        std::fs::write(&path, b"not-a-valid-header-at-all").unwrap();
        assert!(matches!(HnswIndex::load(&path), Err(CortexError::InvalidMagic)));
    }

    #[test]
    fn cosine_distance_mismatched_lengths_is_max() {
        assert_eq!(cosine_distance(&[1.0, 0.0], &[1.0]), 2.0);
    }
}
