use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dense vector for a memory, stored as a little-endian f32 blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub memory_id: i64,
    pub vector: Vec<f32>,
    pub dimensions: usize,
    pub model_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Embedding {
    pub fn new(memory_id: i64, vector: Vec<f32>) -> Self {
        let dimensions = vector.len();
        let now = Utc::now();
        Self {
            memory_id,
            vector,
            dimensions,
            model_version: None,
            created_at: now,
            updated_at: now,
        }
    }
}
