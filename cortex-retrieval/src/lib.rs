//! Hybrid search: BM25 full-text, embedding/ANN, and a Reciprocal-Rank-Fusion
//! combiner that lets both paths contribute without score normalization.

mod embedding_search;
mod fts;
mod metadata_filter;
mod snippet;

use std::collections::HashMap;
use std::sync::Arc;

use cortex_core::errors::CortexResult;
use cortex_embeddings::{EmbeddingStore, HnswIndex};
use cortex_storage::ConnectionPool;

pub use embedding_search::{search_embedding, EmbeddingHit};
pub use fts::{search_fts, FtsHit, FALLBACK_SCORE};
pub use metadata_filter::MetadataFilters;
pub use snippet::rune_safe_snippet;

/// Reciprocal Rank Fusion smoothing constant; matches the default used
/// elsewhere in this workspace's hybrid-search tooling.
const RRF_K: f64 = 60.0;

/// A fused hybrid-search result: the memory id, its combined RRF score, a
/// snippet (from the FTS path when present), and the per-source ranks that
/// contributed.
#[derive(Debug, Clone)]
pub struct HybridHit {
    pub memory_id: i64,
    pub rrf_score: f64,
    pub snippet: Option<String>,
    pub fts_rank: Option<usize>,
    pub embedding_rank: Option<usize>,
}

/// Runs FTS and embedding search independently and fuses their rankings via
/// RRF (`score = Σ 1/(k + rank)`), so neither path's raw score scale (BM25
/// rank vs. cosine similarity) needs to be normalized against the other.
/// `query_vec` is `None` when embedding generation failed upstream or the
/// caller has no query embedding available; the fusion then degrades to FTS
/// alone.
#[allow(clippy::too_many_arguments)]
pub fn search_hybrid(
    pool: &Arc<ConnectionPool>,
    store: &EmbeddingStore,
    hnsw: Option<&HnswIndex>,
    query_text: &str,
    query_vec: Option<&[f32]>,
    k: usize,
    min_sim: f64,
    ef_search: usize,
    filters: &MetadataFilters,
) -> CortexResult<Vec<HybridHit>> {
    let overfetch = k.saturating_mul(3).max(k);

    let fts_hits = search_fts(pool, query_text, overfetch, filters)?;
    let fts_ranked: Vec<(i64, usize)> = fts_hits.iter().enumerate().map(|(rank, h)| (h.memory_id, rank)).collect();
    let snippets: HashMap<i64, String> = fts_hits.into_iter().map(|h| (h.memory_id, h.snippet)).collect();

    let embedding_ranked: Vec<(i64, usize)> = match query_vec {
        Some(vec) => search_embedding(store, hnsw, vec, overfetch, min_sim, ef_search, filters)?
            .into_iter()
            .enumerate()
            .map(|(rank, h)| (h.memory_id, rank))
            .collect(),
        None => Vec::new(),
    };

    let mut scores: HashMap<i64, f64> = HashMap::new();
    let mut fts_ranks: HashMap<i64, usize> = HashMap::new();
    let mut embedding_ranks: HashMap<i64, usize> = HashMap::new();

    for (memory_id, rank) in &fts_ranked {
        *scores.entry(*memory_id).or_default() += 1.0 / (RRF_K + *rank as f64);
        fts_ranks.insert(*memory_id, *rank);
    }
    for (memory_id, rank) in &embedding_ranked {
        *scores.entry(*memory_id).or_default() += 1.0 / (RRF_K + *rank as f64);
        embedding_ranks.insert(*memory_id, *rank);
    }

    let mut hits: Vec<HybridHit> = scores
        .into_iter()
        .map(|(memory_id, rrf_score)| HybridHit {
            memory_id,
            rrf_score,
            snippet: snippets.get(&memory_id).cloned(),
            fts_rank: fts_ranks.get(&memory_id).copied(),
            embedding_rank: embedding_ranks.get(&memory_id).copied(),
        })
        .collect();

    hits.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    Ok(hits)
}
