//! Routes embedding search to the HNSW index when one covers the corpus,
//! falling back to brute-force cosine search otherwise.

use cortex_core::config::RetrievalConfig;
use cortex_core::errors::CortexResult;
use cortex_embeddings::{EmbeddingStore, HnswIndex, VectorMatch};

use crate::metadata_filter::MetadataFilters;

#[derive(Debug, Clone)]
pub struct EmbeddingHit {
    pub memory_id: i64,
    pub similarity: f64,
}

/// `min_sim` is a similarity floor in `[-1, 1]`; `hnsw` is consulted first
/// when present and non-empty, covering the full corpus.
pub fn search_embedding(
    store: &EmbeddingStore,
    hnsw: Option<&HnswIndex>,
    query: &[f32],
    k: usize,
    min_sim: f64,
    ef_search: usize,
    filters: &MetadataFilters,
) -> CortexResult<Vec<EmbeddingHit>> {
    let needs_overfetch = filters.project.is_some() || filters.agent.is_some() || filters.channel.is_some();
    let overfetch = RetrievalConfig::default().metadata_filter_overfetch;
    let fetch_k = if needs_overfetch { k * overfetch } else { k };

    let raw: Vec<VectorMatch> = match hnsw {
        Some(index) if !index.is_empty() => index
            .search(query, fetch_k, ef_search.max(fetch_k))
            .into_iter()
            .map(|hit| VectorMatch {
                memory_id: hit.id,
                similarity: 1.0 - hit.distance / 2.0,
            })
            .filter(|m| m.similarity >= min_sim)
            .collect(),
        _ => store.search(query, fetch_k, min_sim, filters.project.as_deref())?,
    };

    let mut hits: Vec<EmbeddingHit> = raw
        .into_iter()
        .map(|m| EmbeddingHit {
            memory_id: m.memory_id,
            similarity: m.similarity,
        })
        .collect();

    hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    Ok(hits)
}
