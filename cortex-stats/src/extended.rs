use std::collections::HashMap;
use std::sync::Arc;

use cortex_core::errors::{CortexError, CortexResult};
use cortex_storage::ConnectionPool;

fn to_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceDistribution {
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FreshnessBuckets {
    pub today: i64,
    pub this_week: i64,
    pub this_month: i64,
    pub older: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedStats {
    pub distinct_source_files: i64,
    pub earliest_import: Option<String>,
    pub latest_import: Option<String>,
    pub confidence_distribution: ConfidenceDistribution,
    pub fact_type_histogram: HashMap<String, i64>,
    pub freshness: FreshnessBuckets,
}

pub fn extended_stats(pool: &Arc<ConnectionPool>) -> CortexResult<ExtendedStats> {
    pool.readers.with_conn(|conn| {
        let distinct_source_files: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT source_file) FROM memories WHERE deleted_at IS NULL AND source_file != ''",
                [],
                |r| r.get(0),
            )
            .map_err(|e| to_err(e.to_string()))?;

        let earliest_import: Option<String> = conn
            .query_row("SELECT MIN(imported_at) FROM memories WHERE deleted_at IS NULL", [], |r| r.get(0))
            .map_err(|e| to_err(e.to_string()))?;
        let latest_import: Option<String> = conn
            .query_row("SELECT MAX(imported_at) FROM memories WHERE deleted_at IS NULL", [], |r| r.get(0))
            .map_err(|e| to_err(e.to_string()))?;

        let mut confidence_distribution = ConfidenceDistribution::default();
        let mut conf_stmt = conn
            .prepare("SELECT confidence FROM facts WHERE state = 'active'")
            .map_err(|e| to_err(e.to_string()))?;
        let conf_rows = conf_stmt.query_map([], |row| row.get::<_, f64>(0)).map_err(|e| to_err(e.to_string()))?;
        for row in conf_rows {
            let confidence = row.map_err(|e| to_err(e.to_string()))?;
            if confidence >= 0.7 {
                confidence_distribution.high += 1;
            } else if confidence >= 0.3 {
                confidence_distribution.medium += 1;
            } else {
                confidence_distribution.low += 1;
            }
        }

        let mut histogram = HashMap::new();
        let mut type_stmt = conn
            .prepare("SELECT fact_type, COUNT(*) FROM facts WHERE state = 'active' GROUP BY fact_type")
            .map_err(|e| to_err(e.to_string()))?;
        let type_rows = type_stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| to_err(e.to_string()))?;
        for row in type_rows {
            let (fact_type, count) = row.map_err(|e| to_err(e.to_string()))?;
            histogram.insert(fact_type, count);
        }

        let mut freshness = FreshnessBuckets::default();
        let mut fresh_stmt = conn
            .prepare(
                "SELECT
                     CASE
                         WHEN SUBSTR(imported_at, 1, 10) = date('now') THEN 'today'
                         WHEN SUBSTR(imported_at, 1, 10) >= date('now', '-6 days') THEN 'this_week'
                         WHEN SUBSTR(imported_at, 1, 10) >= date('now', 'start of month') THEN 'this_month'
                         ELSE 'older'
                     END AS bucket,
                     COUNT(*)
                 FROM memories
                 WHERE deleted_at IS NULL
                 GROUP BY bucket",
            )
            .map_err(|e| to_err(e.to_string()))?;
        let fresh_rows = fresh_stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| to_err(e.to_string()))?;
        for row in fresh_rows {
            let (bucket, count) = row.map_err(|e| to_err(e.to_string()))?;
            match bucket.as_str() {
                "today" => freshness.today = count,
                "this_week" => freshness.this_week = count,
                "this_month" => freshness.this_month = count,
                _ => freshness.older = count,
            }
        }

        Ok(ExtendedStats {
            distinct_source_files,
            earliest_import,
            latest_import,
            confidence_distribution,
            fact_type_histogram: histogram,
            freshness,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_storage::StorageEngine;

    fn seed_fact(engine: &StorageEngine, confidence: f64, fact_type: &str) {
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "INSERT INTO memories (content, source_file, content_hash, project, memory_class, imported_at, updated_at)
                     VALUES ('x', 'a.md', ?1, '', '', datetime('now'), datetime('now'))",
                    rusqlite::params![format!("h-{confidence}-{fact_type}")],
                )
                .unwrap();
                let memory_id = conn.last_insert_rowid();
                conn.execute(
                    "INSERT INTO facts (memory_id, subject, predicate, object, fact_type, confidence, decay_rate, last_reinforced, created_at, state, agent_id)
                     VALUES (?1, 's', 'p', 'o', ?2, ?3, 0.01, datetime('now'), datetime('now'), 'active', '')",
                    rusqlite::params![memory_id, fact_type, confidence],
                )
                .unwrap();
                Ok::<_, CortexError>(())
            })
            .unwrap();
    }

    #[test]
    fn confidence_distribution_buckets_correctly() {
        let engine = StorageEngine::open_in_memory().unwrap();
        seed_fact(&engine, 0.9, "kv");
        seed_fact(&engine, 0.5, "kv");
        seed_fact(&engine, 0.1, "kv");

        let stats = extended_stats(&engine.pool_arc()).unwrap();
        assert_eq!(stats.confidence_distribution, ConfidenceDistribution { high: 1, medium: 1, low: 1 });
    }

    #[test]
    fn fact_type_histogram_groups_active_facts() {
        let engine = StorageEngine::open_in_memory().unwrap();
        seed_fact(&engine, 0.9, "kv");
        seed_fact(&engine, 0.9, "kv");
        seed_fact(&engine, 0.9, "decision");

        let stats = extended_stats(&engine.pool_arc()).unwrap();
        assert_eq!(stats.fact_type_histogram.get("kv"), Some(&2));
        assert_eq!(stats.fact_type_histogram.get("decision"), Some(&1));
    }

    #[test]
    fn freshness_buckets_put_new_memory_in_today() {
        let engine = StorageEngine::open_in_memory().unwrap();
        seed_fact(&engine, 0.9, "kv");

        let stats = extended_stats(&engine.pool_arc()).unwrap();
        assert_eq!(stats.freshness.today, 1);
        assert_eq!(stats.freshness.this_week, 0);
        assert_eq!(stats.freshness.older, 0);
    }
}
