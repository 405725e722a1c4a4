use serde::{Deserialize, Serialize};

use super::defaults;

/// HNSW ANN index parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Max neighbors per layer above layer 0. Clamped to a minimum of 2.
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Seed for the index's PRNG, for deterministic level assignment/replay.
    pub seed: u64,
}

impl HnswConfig {
    /// `M_max0`, the layer-0 neighbor cap (2M).
    pub fn m_max0(&self) -> usize {
        self.m() * 2
    }

    /// `M`, clamped to a minimum of 2.
    pub fn m(&self) -> usize {
        self.m.max(defaults::DEFAULT_HNSW_MIN_M)
    }

    /// `level_mult = 1 / ln(M)`.
    pub fn level_mult(&self) -> f64 {
        1.0 / (self.m() as f64).ln()
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: defaults::DEFAULT_HNSW_M,
            ef_construction: defaults::DEFAULT_HNSW_EF_CONSTRUCTION,
            ef_search: defaults::DEFAULT_HNSW_EF_SEARCH,
            seed: 0x434f_5254_4558, // "CORTEX" in hex, arbitrary fixed seed
        }
    }
}
