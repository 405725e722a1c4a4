use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named topic grouping facts by subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: i64,
    pub name: String,
    /// At most 8 alternate subject spellings.
    pub aliases: Vec<String>,
    pub cohesion: f64,
    pub fact_count: i64,
    pub avg_confidence: f64,
    pub color: String,
    pub top_subjects: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

pub const MAX_ALIASES: usize = 8;
