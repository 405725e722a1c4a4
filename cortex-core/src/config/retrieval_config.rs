use serde::{Deserialize, Serialize};

/// Hybrid search configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_k: usize,
    pub min_similarity: f32,
    /// Overfetch multiplier applied when metadata filters narrow an ANN/brute-force search.
    pub metadata_filter_overfetch: usize,
    /// Half-width, in runes, of the CJK/LIKE fallback snippet window.
    pub fallback_snippet_radius: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 10,
            min_similarity: 0.0,
            metadata_filter_overfetch: 3,
            fallback_snippet_radius: 60,
        }
    }
}
