use std::sync::Arc;

use cortex_core::errors::{CortexError, CortexResult};
use cortex_storage::ConnectionPool;

fn to_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

/// Headline counts plus on-disk size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicStats {
    pub memory_count: i64,
    pub active_fact_count: i64,
    pub embedding_count: i64,
    pub event_count: i64,
    pub db_size_bytes: i64,
}

pub fn basic_stats(pool: &Arc<ConnectionPool>) -> CortexResult<BasicStats> {
    pool.readers.with_conn(|conn| {
        let memory_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories WHERE deleted_at IS NULL", [], |r| r.get(0))
            .map_err(|e| to_err(e.to_string()))?;
        let active_fact_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM facts WHERE state = 'active'", [], |r| r.get(0))
            .map_err(|e| to_err(e.to_string()))?;
        let embedding_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get(0))
            .map_err(|e| to_err(e.to_string()))?;
        let event_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memory_events", [], |r| r.get(0))
            .map_err(|e| to_err(e.to_string()))?;

        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0)).map_err(|e| to_err(e.to_string()))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0)).map_err(|e| to_err(e.to_string()))?;

        Ok(BasicStats {
            memory_count,
            active_fact_count,
            embedding_count,
            event_count,
            db_size_bytes: page_count * page_size,
        })
    })
}
