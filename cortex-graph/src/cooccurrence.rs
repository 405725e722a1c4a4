use std::sync::Arc;

use chrono::Utc;
use rusqlite::params;

use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::model::CooccurrencePair;
use cortex_storage::ConnectionPool;

fn to_repo_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

/// A cooccurring pair with no existing `relates_to` edge between the two
/// facts — a candidate for [`crate::inference::InferenceEngine`]'s first rule.
#[derive(Debug, Clone)]
pub struct CooccurrenceSuggestion {
    pub pair: CooccurrencePair,
}

pub struct CooccurrenceStore {
    pool: Arc<ConnectionPool>,
}

impl CooccurrenceStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Records one cooccurrence between `a` and `b`. No-op for `a == b` or a
    /// non-positive id.
    pub fn record(&self, a: i64, b: i64) -> CortexResult<()> {
        let Some((lo, hi)) = CooccurrencePair::canonical(a, b) else {
            return Ok(());
        };
        self.pool.writer.with_conn_sync(|conn| {
            conn.execute(
                "INSERT INTO cooccurrence (fact_a, fact_b, count, last_seen)
                 VALUES (?1, ?2, 1, ?3)
                 ON CONFLICT(fact_a, fact_b) DO UPDATE SET count = count + 1, last_seen = ?3",
                params![lo, hi, Utc::now()],
            )
            .map_err(|e| to_repo_err(e.to_string()))?;
            Ok(())
        })
    }

    /// Records every pairwise cooccurrence among `ids` in one transaction.
    /// Duplicate ids are collapsed first; a per-pair insert failure is
    /// skipped rather than aborting the batch.
    pub fn record_batch(&self, ids: &[i64]) -> CortexResult<()> {
        let mut unique: Vec<i64> = ids.iter().copied().filter(|&id| id > 0).collect();
        unique.sort_unstable();
        unique.dedup();

        if unique.len() < 2 {
            return Ok(());
        }

        self.pool.writer.with_conn_sync(|conn| {
            let tx = conn.unchecked_transaction().map_err(|e| to_repo_err(e.to_string()))?;
            let now = Utc::now();
            for i in 0..unique.len() {
                for j in (i + 1)..unique.len() {
                    let Some((lo, hi)) = CooccurrencePair::canonical(unique[i], unique[j]) else {
                        continue;
                    };
                    let _ = tx.execute(
                        "INSERT INTO cooccurrence (fact_a, fact_b, count, last_seen)
                         VALUES (?1, ?2, 1, ?3)
                         ON CONFLICT(fact_a, fact_b) DO UPDATE SET count = count + 1, last_seen = ?3",
                        params![lo, hi, now],
                    );
                }
            }
            tx.commit().map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Pairs with `count >= min_count` lacking a `relates_to` edge in either
    /// direction.
    pub fn suggest(&self, min_count: i64) -> CortexResult<Vec<CooccurrenceSuggestion>> {
        self.pool.readers.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT c.fact_a, c.fact_b, c.count, c.last_seen FROM cooccurrence c
                     WHERE c.count >= ?1
                     AND NOT EXISTS (
                         SELECT 1 FROM fact_edges e
                         WHERE e.edge_type = 'relates_to'
                         AND ((e.source_fact_id = c.fact_a AND e.target_fact_id = c.fact_b)
                              OR (e.source_fact_id = c.fact_b AND e.target_fact_id = c.fact_a))
                     )
                     ORDER BY c.count DESC",
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            let rows = stmt
                .query_map(params![min_count], |row| {
                    Ok(CooccurrenceSuggestion {
                        pair: CooccurrencePair {
                            a: row.get(0)?,
                            b: row.get(1)?,
                            count: row.get(2)?,
                            last_seen: row.get(3)?,
                        },
                    })
                })
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| to_repo_err(e.to_string()))
        })
    }
}
