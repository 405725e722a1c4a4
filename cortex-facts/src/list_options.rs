use cortex_core::config::defaults::DEFAULT_LIST_LIMIT;
use cortex_core::model::{FactState, FactType};

/// Filters and pagination for [`crate::FactRepository::list`].
///
/// `state` excludes `superseded` by default unless `include_superseded` is
/// set; all filters are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct ListFactsOptions {
    pub fact_type: Option<FactType>,
    pub state: Option<FactState>,
    pub source_file: Option<String>,
    /// Scopes to this agent's own facts plus global (`""`) facts.
    pub agent_id: Option<String>,
    pub include_superseded: bool,
    pub limit: usize,
    pub offset: usize,
}

impl ListFactsOptions {
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            ..Default::default()
        }
    }
}
