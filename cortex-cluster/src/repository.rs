use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::params;

use cortex_core::config::ClusterConfig;
use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::model::Cluster;
use cortex_storage::ConnectionPool;

use crate::palette::color_for;
use crate::subject_graph::{compute_clusters, ClusterComputation, FactSubjectRow};

fn to_repo_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

pub struct ClusterRepository {
    pool: Arc<ConnectionPool>,
    config: ClusterConfig,
}

impl ClusterRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self::with_config(pool, ClusterConfig::default())
    }

    pub fn with_config(pool: Arc<ConnectionPool>, config: ClusterConfig) -> Self {
        Self { pool, config }
    }

    pub fn list(&self) -> CortexResult<Vec<Cluster>> {
        self.pool.readers.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, canonical_name, aliases, cohesion, fact_count, average_confidence, palette_color, top_subjects, updated_at FROM clusters")
                .map_err(|e| to_repo_err(e.to_string()))?;
            let rows = stmt
                .query_map([], cluster_from_row)
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Discards all clusters and assignments and recomputes them from every
    /// active fact with a non-blank subject.
    pub fn rebuild(&self) -> CortexResult<usize> {
        let rows = self.load_active_subject_rows()?;
        let computations = compute_clusters(&rows);
        self.replace_all(&computations)?;
        Ok(computations.len())
    }

    /// Incrementally folds `new_fact_ids` into the existing cluster
    /// assignment, falling back to [`Self::rebuild`] when the existing
    /// clustering can't meaningfully absorb them.
    pub fn update(&self, new_fact_ids: &[i64]) -> CortexResult<usize> {
        if new_fact_ids.is_empty() {
            return Ok(self.list()?.len());
        }

        let existing_cluster_count = self.pool.readers.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM clusters", [], |r| r.get::<_, i64>(0))
                .map_err(|e| to_repo_err(e.to_string()))
        })?;

        let existing_subjects = self.distinct_assigned_subjects()?;
        let candidate_rows = self.load_subject_rows_for_facts(new_fact_ids)?;
        let new_subjects: HashSet<String> = candidate_rows
            .iter()
            .map(|r| cortex_facts::normalize_group_key(&r.subject))
            .filter(|s| !s.is_empty())
            .collect();

        let all_new = !new_subjects.is_empty() && new_subjects.iter().all(|s| !existing_subjects.contains(s));
        if existing_cluster_count == 0 || all_new {
            return self.rebuild();
        }

        let novel_count = new_subjects.difference(&existing_subjects).count();
        if existing_subjects.len() > 0
            && novel_count as f64 / existing_subjects.len() as f64 > self.config.new_subject_rebuild_ratio
        {
            return self.rebuild();
        }

        let mut touched_clusters: HashSet<i64> = HashSet::new();
        for row in &candidate_rows {
            let Some(cluster_id) = self.best_cluster_for_fact(row)? else {
                continue;
            };
            self.pool.writer.with_conn_sync(|conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO fact_clusters (fact_id, cluster_id, relevance) VALUES (?1, ?2, 1.0)",
                    params![row.fact_id, cluster_id],
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
                Ok::<_, CortexError>(())
            })?;
            touched_clusters.insert(cluster_id);
        }

        for cluster_id in touched_clusters {
            self.recompute_rollup(cluster_id)?;
        }

        Ok(self.list()?.len())
    }

    fn load_active_subject_rows(&self) -> CortexResult<Vec<FactSubjectRow>> {
        self.pool.readers.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, memory_id, subject, confidence FROM facts WHERE state = 'active' AND subject != ''")
                .map_err(|e| to_repo_err(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(FactSubjectRow {
                        fact_id: row.get(0)?,
                        memory_id: row.get(1)?,
                        subject: row.get(2)?,
                        confidence: row.get(3)?,
                    })
                })
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| to_repo_err(e.to_string()))
        })
    }

    fn load_subject_rows_for_facts(&self, fact_ids: &[i64]) -> CortexResult<Vec<FactSubjectRow>> {
        self.pool.readers.with_conn(|conn| {
            let placeholders = fact_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!(
                "SELECT id, memory_id, subject, confidence FROM facts
                 WHERE state = 'active' AND subject != '' AND id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql).map_err(|e| to_repo_err(e.to_string()))?;
            let args: Vec<&dyn rusqlite::ToSql> = fact_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
            let rows = stmt
                .query_map(args.as_slice(), |row| {
                    Ok(FactSubjectRow {
                        fact_id: row.get(0)?,
                        memory_id: row.get(1)?,
                        subject: row.get(2)?,
                        confidence: row.get(3)?,
                    })
                })
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| to_repo_err(e.to_string()))
        })
    }

    fn distinct_assigned_subjects(&self) -> CortexResult<HashSet<String>> {
        self.pool.readers.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT f.subject FROM facts f
                     JOIN fact_clusters fc ON fc.fact_id = f.id",
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| to_repo_err(e.to_string()))?;
            let mut out = HashSet::new();
            for row in rows {
                let subject = row.map_err(|e| to_repo_err(e.to_string()))?;
                out.insert(cortex_facts::normalize_group_key(&subject));
            }
            Ok(out)
        })
    }

    /// Finds the cluster with the most existing facts sharing `row`'s
    /// normalized subject; falls back to the cluster with the most facts
    /// for `row`'s memory; `None` if neither yields a candidate.
    fn best_cluster_for_fact(&self, row: &FactSubjectRow) -> CortexResult<Option<i64>> {
        let normalized_subject = cortex_facts::normalize_group_key(&row.subject);

        self.pool.readers.with_conn(|conn| {
            let by_subject: Option<i64> = conn
                .query_row(
                    "SELECT fc.cluster_id FROM fact_clusters fc
                     JOIN facts f ON f.id = fc.fact_id
                     WHERE LOWER(TRIM(f.subject)) = ?1
                     GROUP BY fc.cluster_id
                     ORDER BY COUNT(*) DESC
                     LIMIT 1",
                    params![normalized_subject],
                    |r| r.get(0),
                )
                .ok();
            if by_subject.is_some() {
                return Ok(by_subject);
            }

            let by_memory: Option<i64> = conn
                .query_row(
                    "SELECT fc.cluster_id FROM fact_clusters fc
                     JOIN facts f ON f.id = fc.fact_id
                     WHERE f.memory_id = ?1
                     GROUP BY fc.cluster_id
                     ORDER BY COUNT(*) DESC
                     LIMIT 1",
                    params![row.memory_id],
                    |r| r.get(0),
                )
                .ok();
            Ok(by_memory)
        })
    }

    /// Recomputes name/aliases/counts/cohesion for `cluster_id` from its
    /// current `fact_clusters` assignment.
    fn recompute_rollup(&self, cluster_id: i64) -> CortexResult<()> {
        let rows = self.pool.readers.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT f.id, f.memory_id, f.subject, f.confidence FROM facts f
                     JOIN fact_clusters fc ON fc.fact_id = f.id
                     WHERE fc.cluster_id = ?1 AND f.subject != ''",
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            let rows = stmt
                .query_map(params![cluster_id], |row| {
                    Ok(FactSubjectRow {
                        fact_id: row.get(0)?,
                        memory_id: row.get(1)?,
                        subject: row.get(2)?,
                        confidence: row.get(3)?,
                    })
                })
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| to_repo_err(e.to_string()))
        })?;

        let mut computations = compute_clusters(&rows);
        // Facts already sharing a cluster should form one component; if the
        // assignment has drifted, keep the largest and leave the rest for
        // the next full rebuild to reconcile.
        computations.sort_by_key(|c| std::cmp::Reverse(c.fact_count));
        let Some(computation) = computations.into_iter().next() else {
            return Ok(());
        };

        self.pool.writer.with_conn_sync(|conn| {
            conn.execute(
                "UPDATE clusters SET canonical_name = ?1, aliases = ?2, cohesion = ?3, fact_count = ?4,
                     average_confidence = ?5, top_subjects = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    computation.name,
                    serde_json::to_string(&computation.aliases).unwrap_or_else(|_| "[]".to_string()),
                    computation.cohesion,
                    computation.fact_count,
                    computation.avg_confidence,
                    serde_json::to_string(&computation.top_subjects).unwrap_or_else(|_| "[]".to_string()),
                    Utc::now(),
                    cluster_id,
                ],
            )
            .map_err(|e| to_repo_err(e.to_string()))?;
            Ok(())
        })
    }

    fn replace_all(&self, computations: &[ClusterComputation]) -> CortexResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            let tx = conn.unchecked_transaction().map_err(|e| to_repo_err(e.to_string()))?;
            tx.execute("DELETE FROM fact_clusters", []).map_err(|e| to_repo_err(e.to_string()))?;
            tx.execute("DELETE FROM clusters", []).map_err(|e| to_repo_err(e.to_string()))?;

            let now = Utc::now();
            for (index, computation) in computations.iter().enumerate() {
                tx.execute(
                    "INSERT INTO clusters
                         (canonical_name, aliases, cohesion, fact_count, average_confidence, palette_color, top_subjects, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        computation.name,
                        serde_json::to_string(&computation.aliases).unwrap_or_else(|_| "[]".to_string()),
                        computation.cohesion,
                        computation.fact_count,
                        computation.avg_confidence,
                        color_for(index),
                        serde_json::to_string(&computation.top_subjects).unwrap_or_else(|_| "[]".to_string()),
                        now,
                    ],
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
                let cluster_id = tx.last_insert_rowid();

                for fact_id in &computation.fact_ids {
                    tx.execute(
                        "INSERT INTO fact_clusters (fact_id, cluster_id, relevance) VALUES (?1, ?2, 1.0)",
                        params![fact_id, cluster_id],
                    )
                    .map_err(|e| to_repo_err(e.to_string()))?;
                }
            }

            tx.commit().map_err(|e| to_repo_err(e.to_string()))
        })
    }
}

fn cluster_from_row(row: &rusqlite::Row) -> rusqlite::Result<Cluster> {
    let aliases_json: String = row.get(2)?;
    let top_subjects_json: String = row.get(7)?;
    let updated_at: DateTime<Utc> = row.get(8)?;
    Ok(Cluster {
        id: row.get(0)?,
        name: row.get(1)?,
        aliases: serde_json::from_str(&aliases_json).unwrap_or_default(),
        cohesion: row.get(3)?,
        fact_count: row.get(4)?,
        avg_confidence: row.get(5)?,
        color: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        top_subjects: serde_json::from_str(&top_subjects_json).unwrap_or_default(),
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::errors::CortexError;
    use cortex_storage::StorageEngine;

    fn seed_fact(engine: &StorageEngine, memory_id: i64, subject: &str) -> i64 {
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "INSERT INTO facts (memory_id, subject, predicate, object, fact_type, confidence, decay_rate, last_reinforced, created_at, state, agent_id)
                     VALUES (?1, ?2, 'p', 'o', 'kv', 1.0, 0.01, datetime('now'), datetime('now'), 'active', '')",
                    params![memory_id, subject],
                )
                .unwrap();
                Ok::<_, CortexError>(conn.last_insert_rowid())
            })
            .unwrap()
    }

    fn seed_memory(engine: &StorageEngine) -> i64 {
        static COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
        let hash = format!("h{}", COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst));
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "INSERT INTO memories (content, source_file, content_hash, project, memory_class, imported_at, updated_at)
                     VALUES ('hi', 'a.md', ?1, 'p', 'note', datetime('now'), datetime('now'))",
                    params![hash],
                )
                .unwrap();
                Ok::<_, CortexError>(conn.last_insert_rowid())
            })
            .unwrap()
    }

    #[test]
    fn rebuild_creates_clusters_from_active_facts() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory_id = seed_memory(&engine);
        seed_fact(&engine, memory_id, "Quinn");
        seed_fact(&engine, memory_id, "Philadelphia");

        let repo = ClusterRepository::new(engine.pool_arc());
        let count = repo.rebuild().unwrap();
        assert_eq!(count, 1);
        let clusters = repo.list().unwrap();
        assert_eq!(clusters[0].fact_count, 2);
    }

    #[test]
    fn update_with_no_existing_clusters_triggers_rebuild() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory_id = seed_memory(&engine);
        let fact_id = seed_fact(&engine, memory_id, "Quinn");

        let repo = ClusterRepository::new(engine.pool_arc());
        repo.update(&[fact_id]).unwrap();
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn update_assigns_new_fact_sharing_existing_subject() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory_id = seed_memory(&engine);
        let first = seed_fact(&engine, memory_id, "Quinn");

        let repo = ClusterRepository::new(engine.pool_arc());
        repo.update(&[first]).unwrap();

        let memory_id_2 = seed_memory(&engine);
        let second = seed_fact(&engine, memory_id_2, "Quinn");
        repo.update(&[second]).unwrap();

        let clusters = repo.list().unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].fact_count, 2);
    }

    #[test]
    fn incremental_update_matches_fresh_rebuild_when_no_subject_is_novel() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory_id = seed_memory(&engine);
        let a = seed_fact(&engine, memory_id, "Quinn");
        let b = seed_fact(&engine, memory_id, "Philadelphia");

        let repo = ClusterRepository::new(engine.pool_arc());
        repo.rebuild().unwrap();

        // A third fact reusing an already-clustered subject should land in
        // the same cluster whether folded in incrementally or rebuilt.
        let c = seed_fact(&engine, memory_id, "Quinn");
        repo.update(&[c]).unwrap();
        let incremental = repo.list().unwrap();

        repo.rebuild().unwrap();
        let rebuilt = repo.list().unwrap();

        assert_eq!(incremental.len(), rebuilt.len());
        assert_eq!(incremental[0].fact_count, rebuilt[0].fact_count);
        let _ = (a, b);
    }
}
