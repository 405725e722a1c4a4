use serde::{Deserialize, Serialize};

use super::defaults;

/// Project & class tagger configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    /// Minimum distinct keyword hits for a content rule to fire.
    pub content_rule_min_hits: usize,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            content_rule_min_hits: defaults::DEFAULT_CONTENT_RULE_MIN_HITS,
        }
    }
}
