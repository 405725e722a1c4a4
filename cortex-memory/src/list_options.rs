use chrono::{DateTime, Utc};

use cortex_core::config::defaults::DEFAULT_LIST_LIMIT;

/// Filters and pagination for [`crate::MemoryRepository::list`].
///
/// All filters are optional and conjunctive (AND'd together). Soft-deleted
/// memories are always excluded.
#[derive(Debug, Clone, Default)]
pub struct ListMemoriesOptions {
    pub source_file: Option<String>,
    pub project: Option<String>,
    pub agent_id: Option<String>,
    pub channel: Option<String>,
    /// Inclusive lower bound on `imported_at`.
    pub after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `imported_at`, applied as `< before + 1 day`.
    pub before: Option<DateTime<Utc>>,
    pub memory_classes: Option<Vec<String>>,
    pub limit: usize,
    pub offset: usize,
}

impl ListMemoriesOptions {
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            ..Default::default()
        }
    }
}
