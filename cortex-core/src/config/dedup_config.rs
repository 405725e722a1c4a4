use serde::{Deserialize, Serialize};

use super::defaults;

/// Fact dedup configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub similarity_threshold: f64,
    pub max_preview: usize,
    pub dry_run: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: defaults::DEFAULT_DEDUP_SIMILARITY_THRESHOLD,
            max_preview: defaults::DEFAULT_DEDUP_MAX_PREVIEW,
            dry_run: true,
        }
    }
}
