use serde::{Deserialize, Serialize};

use super::defaults;

/// Topic clustering configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Rebuild (rather than incrementally update) when `new_subjects / existing_subjects`
    /// exceeds this ratio.
    pub new_subject_rebuild_ratio: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            new_subject_rebuild_ratio: defaults::DEFAULT_NEW_SUBJECT_REBUILD_RATIO,
        }
    }
}
