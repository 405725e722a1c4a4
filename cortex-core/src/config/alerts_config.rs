use serde::{Deserialize, Serialize};

use super::defaults;

/// Alert & watch engine configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub decay_critical_threshold: f64,
    pub decay_warning_threshold: f64,
    pub cross_agent_window_days: i64,
    pub conflict_limit: usize,
    pub min_cooccurrence_count: i64,
    pub inference_min_confidence: f64,
    pub inference_max_edges: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            decay_critical_threshold: defaults::DEFAULT_DECAY_CRITICAL_THRESHOLD,
            decay_warning_threshold: defaults::DEFAULT_DECAY_WARNING_THRESHOLD,
            cross_agent_window_days: defaults::DEFAULT_CROSS_AGENT_WINDOW_DAYS,
            conflict_limit: defaults::DEFAULT_CONFLICT_LIMIT,
            min_cooccurrence_count: defaults::DEFAULT_MIN_COOCCURRENCE_COUNT,
            inference_min_confidence: defaults::DEFAULT_INFERENCE_MIN_CONFIDENCE,
            inference_max_edges: defaults::DEFAULT_INFERENCE_MAX_EDGES,
        }
    }
}
