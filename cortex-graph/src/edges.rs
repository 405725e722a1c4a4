use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::model::{EdgeSource, EdgeType, FactEdge};
use cortex_storage::ConnectionPool;

fn to_repo_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

pub struct EdgeRepository {
    pool: Arc<ConnectionPool>,
}

impl EdgeRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Inserts `edge`. Returns `EdgeExists` when the
    /// `(source_fact_id, target_fact_id, edge_type)` uniqueness constraint
    /// rejects the insert.
    pub fn add(&self, edge: &FactEdge) -> CortexResult<i64> {
        self.pool.writer.with_conn_sync(|conn| {
            let changed = conn
                .execute(
                    "INSERT OR IGNORE INTO fact_edges
                         (source_fact_id, target_fact_id, edge_type, confidence, source, agent_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        edge.source_fact_id,
                        edge.target_fact_id,
                        edge.edge_type.as_str(),
                        edge.confidence,
                        edge.source.as_str(),
                        edge.agent_id,
                        edge.created_at,
                    ],
                )
                .map_err(|e| to_repo_err(e.to_string()))?;

            if changed == 0 {
                return Err(CortexError::EdgeExists {
                    source_fact_id: edge.source_fact_id,
                    target_fact_id: edge.target_fact_id,
                    edge_type: edge.edge_type.as_str().to_string(),
                });
            }
            Ok(conn.last_insert_rowid())
        })
    }

    /// Edges touching `fact_id` (either endpoint) with `confidence >= min_confidence`.
    pub fn edges_for_fact(&self, fact_id: i64, min_confidence: f64) -> CortexResult<Vec<FactEdge>> {
        self.pool.readers.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, source_fact_id, target_fact_id, edge_type, confidence, source, agent_id, created_at
                     FROM fact_edges
                     WHERE (source_fact_id = ?1 OR target_fact_id = ?1) AND confidence >= ?2",
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            let rows = stmt
                .query_map(params![fact_id, min_confidence], edge_from_row)
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Deletes `inferred`-sourced edges older than `max_age_days`. Returns
    /// the number of rows deleted.
    pub fn decay_inferred_edges(&self, max_age_days: i64) -> CortexResult<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(max_age_days);
        self.pool.writer.with_conn_sync(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM fact_edges WHERE source = 'inferred' AND created_at < ?1",
                    params![cutoff],
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            Ok(changed as u64)
        })
    }
}

fn edge_from_row(row: &rusqlite::Row) -> rusqlite::Result<FactEdge> {
    let edge_type_str: String = row.get(3)?;
    let source_str: String = row.get(5)?;
    Ok(FactEdge {
        id: row.get(0)?,
        source_fact_id: row.get(1)?,
        target_fact_id: row.get(2)?,
        edge_type: EdgeType::parse(&edge_type_str).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, "invalid edge_type".into())
        })?,
        confidence: row.get(4)?,
        source: EdgeSource::parse(&source_str).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, "invalid source".into())
        })?,
        agent_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_storage::StorageEngine;

    fn seed_facts(engine: &StorageEngine, n: usize) -> Vec<i64> {
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "INSERT INTO memories (content, source_file, content_hash, project, memory_class, imported_at, updated_at)
                     VALUES ('hi', 'a.md', 'h1', 'p', 'note', datetime('now'), datetime('now'))",
                    [],
                )
                .unwrap();
                let memory_id = conn.last_insert_rowid();
                let mut ids = Vec::new();
                for i in 0..n {
                    conn.execute(
                        "INSERT INTO facts (memory_id, subject, predicate, object, fact_type, confidence, decay_rate, last_reinforced, created_at, state, agent_id)
                         VALUES (?1, 's', 'p', ?2, 'kv', 1.0, 0.01, datetime('now'), datetime('now'), 'active', '')",
                        params![memory_id, format!("o{i}")],
                    )
                    .unwrap();
                    ids.push(conn.last_insert_rowid());
                }
                Ok::<_, CortexError>(ids)
            })
            .unwrap()
    }

    #[test]
    fn add_then_fetch_by_endpoint() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let ids = seed_facts(&engine, 2);
        let repo = EdgeRepository::new(engine.pool_arc());
        let edge = FactEdge::new(ids[0], ids[1], EdgeType::RelatesTo).unwrap();
        repo.add(&edge).unwrap();

        let edges = repo.edges_for_fact(ids[0], 0.0).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, EdgeType::RelatesTo);
    }

    #[test]
    fn duplicate_insert_reports_edge_exists() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let ids = seed_facts(&engine, 2);
        let repo = EdgeRepository::new(engine.pool_arc());
        let edge = FactEdge::new(ids[0], ids[1], EdgeType::Supports).unwrap();
        repo.add(&edge).unwrap();

        let err = repo.add(&edge).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn decay_inferred_edges_deletes_only_old_inferred() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let ids = seed_facts(&engine, 3);
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "INSERT INTO fact_edges (source_fact_id, target_fact_id, edge_type, confidence, source, created_at)
                     VALUES (?1, ?2, 'relates_to', 0.5, 'inferred', datetime('now', '-90 days'))",
                    params![ids[0], ids[1]],
                )
                .unwrap();
                conn.execute(
                    "INSERT INTO fact_edges (source_fact_id, target_fact_id, edge_type, confidence, source, created_at)
                     VALUES (?1, ?2, 'relates_to', 0.5, 'explicit', datetime('now', '-90 days'))",
                    params![ids[1], ids[2]],
                )
                .unwrap();
                Ok::<_, CortexError>(())
            })
            .unwrap();

        let repo = EdgeRepository::new(engine.pool_arc());
        let deleted = repo.decay_inferred_edges(30).unwrap();
        assert_eq!(deleted, 1);
    }
}
