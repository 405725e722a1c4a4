use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use cortex_core::config::defaults::{DEFAULT_CONFIDENCE, DEFAULT_CROSS_AGENT_WINDOW_DAYS, DEFAULT_DECAY_RATE};
use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::model::{AccessType, Fact, FactState, FactType};
use cortex_storage::ConnectionPool;

use crate::list_options::ListFactsOptions;
use crate::row::fact_from_row;

fn to_repo_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

/// Fields needed to insert a new fact; defaults mirror [`Fact::new`].
#[derive(Debug, Clone)]
pub struct NewFact {
    pub memory_id: i64,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub fact_type: FactType,
    pub source_quote: Option<String>,
    /// `""` = global.
    pub agent_id: String,
}

impl NewFact {
    pub fn new(
        memory_id: i64,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        fact_type: FactType,
    ) -> Self {
        Self {
            memory_id,
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            fact_type,
            source_quote: None,
            agent_id: String::new(),
        }
    }
}

pub struct FactRepository {
    pool: Arc<ConnectionPool>,
}

impl FactRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn add(&self, fact: NewFact) -> CortexResult<i64> {
        self.pool.writer.with_conn_sync(|conn| {
            conn.execute(
                "INSERT INTO facts
                     (memory_id, subject, predicate, object, fact_type, confidence,
                      decay_rate, last_reinforced, source_quote, created_at, state, agent_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?8, 'active', ?10)",
                params![
                    fact.memory_id,
                    fact.subject,
                    fact.predicate,
                    fact.object,
                    fact.fact_type.as_str(),
                    DEFAULT_CONFIDENCE,
                    DEFAULT_DECAY_RATE,
                    Utc::now(),
                    fact.source_quote,
                    fact.agent_id,
                ],
            )
            .map_err(|e| to_repo_err(e.to_string()))?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get(&self, id: i64) -> CortexResult<Option<Fact>> {
        self.pool.readers.with_conn(|conn| {
            conn.query_row("SELECT * FROM facts WHERE id = ?1", params![id], fact_from_row)
                .optional()
                .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    pub fn list(&self, opts: &ListFactsOptions) -> CortexResult<Vec<Fact>> {
        self.pool.readers.with_conn(|conn| {
            let mut sql = String::from("SELECT f.* FROM facts f");
            let mut joined_memories = false;
            if opts.source_file.is_some() {
                sql.push_str(" JOIN memories m ON m.id = f.memory_id");
                joined_memories = true;
            }
            sql.push_str(" WHERE 1=1");

            let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if !opts.include_superseded {
                match &opts.state {
                    Some(state) => {
                        if *state == FactState::Superseded {
                            return Err(to_repo_err(
                                "state filter conflicts with include_superseded=false",
                            ));
                        }
                        sql.push_str(&format!(" AND f.state = ?{}", args.len() + 1));
                        args.push(Box::new(state.as_str().to_string()));
                    }
                    None => sql.push_str(" AND f.state != 'superseded'"),
                }
            } else if let Some(state) = &opts.state {
                sql.push_str(&format!(" AND f.state = ?{}", args.len() + 1));
                args.push(Box::new(state.as_str().to_string()));
            }

            if let Some(fact_type) = &opts.fact_type {
                sql.push_str(&format!(" AND f.fact_type = ?{}", args.len() + 1));
                args.push(Box::new(fact_type.as_str().to_string()));
            }

            if joined_memories {
                sql.push_str(&format!(" AND m.source_file = ?{}", args.len() + 1));
                args.push(Box::new(opts.source_file.clone().unwrap()));
            }

            if let Some(agent_id) = &opts.agent_id {
                sql.push_str(&format!(
                    " AND (f.agent_id = ?{} OR f.agent_id = '')",
                    args.len() + 1
                ));
                args.push(Box::new(agent_id.clone()));
            }

            sql.push_str(&format!(
                " ORDER BY f.id DESC LIMIT ?{} OFFSET ?{}",
                args.len() + 1,
                args.len() + 2
            ));
            args.push(Box::new(opts.limit as i64));
            args.push(Box::new(opts.offset as i64));

            let mut stmt = conn.prepare(&sql).map_err(|e| to_repo_err(e.to_string()))?;
            let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
            let rows = stmt
                .query_map(param_refs.as_slice(), fact_from_row)
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Lists all facts with `state = 'active'`, regardless of agent scoping.
    /// Used by dedup, which groups over the whole active set.
    pub fn list_active(&self) -> CortexResult<Vec<Fact>> {
        self.pool.readers.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM facts WHERE state = 'active'")
                .map_err(|e| to_repo_err(e.to_string()))?;
            let rows = stmt
                .query_map([], fact_from_row)
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Supersedes `old_id` with `new_id`: flags the old fact, logs a memory
    /// event, and inserts a `supersedes` edge (new → old). `EdgeExists` from
    /// the edge insert is swallowed as non-fatal.
    pub fn supersede(&self, old_id: i64, new_id: i64, reason: &str) -> CortexResult<()> {
        if old_id == new_id {
            return Err(to_repo_err("cannot supersede a fact with itself"));
        }
        if old_id <= 0 || new_id <= 0 {
            return Err(to_repo_err("supersede requires positive fact ids"));
        }

        self.pool.writer.with_conn_sync(|conn| {
            let tx = conn.unchecked_transaction().map_err(|e| to_repo_err(e.to_string()))?;

            let updated = tx
                .execute(
                    "UPDATE facts SET superseded_by = ?1, confidence = 0.0, state = 'superseded'
                     WHERE id = ?2 AND state != 'superseded'",
                    params![new_id, old_id],
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            if updated == 0 {
                return Err(CortexError::FactNotFound(old_id));
            }

            tx.execute(
                "INSERT INTO memory_events (fact_id, event_type, old_value, new_value, created_at)
                 VALUES (?1, 'update', ?2, ?3, ?4)",
                params![
                    old_id,
                    format!("active fact:{old_id}"),
                    format!("superseded_by:{new_id} reason:{reason}"),
                    Utc::now(),
                ],
            )
            .map_err(|e| to_repo_err(e.to_string()))?;

            let edge_result = tx.execute(
                "INSERT INTO fact_edges (source_fact_id, target_fact_id, edge_type, confidence, source, created_at)
                 VALUES (?1, ?2, 'supersedes', 1.0, 'detected', ?3)",
                params![new_id, old_id, Utc::now()],
            );
            if let Err(e) = edge_result {
                if !is_unique_violation(&e) {
                    return Err(to_repo_err(e.to_string()));
                }
            }

            tx.commit().map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Records an access and applies the corresponding weighted reinforcement.
    /// No-op (for reinforcement purposes) if the fact is superseded.
    pub fn record_access(&self, fact_id: i64, agent_id: &str, access_type: AccessType) -> CortexResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            let tx = conn.unchecked_transaction().map_err(|e| to_repo_err(e.to_string()))?;

            tx.execute(
                "INSERT INTO fact_access (fact_id, agent_id, access_type, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![fact_id, agent_id, access_type.as_str(), Utc::now()],
            )
            .map_err(|e| to_repo_err(e.to_string()))?;

            apply_reinforcement(&tx, fact_id, access_type.weight())?;

            tx.commit().map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// If ≥2 distinct non-empty agents accessed `fact_id` within `window_days`,
    /// applies a reference-weight (0.5) reinforcement and returns `true`.
    pub fn check_cross_agent(&self, fact_id: i64, window_days: Option<i64>) -> CortexResult<bool> {
        let window_days = window_days.unwrap_or(DEFAULT_CROSS_AGENT_WINDOW_DAYS);
        let since: DateTime<Utc> = Utc::now() - Duration::days(window_days);

        self.pool.writer.with_conn_sync(|conn| {
            let distinct_agents: i64 = conn
                .query_row(
                    "SELECT COUNT(DISTINCT agent_id) FROM fact_access
                     WHERE fact_id = ?1 AND agent_id != '' AND created_at >= ?2",
                    params![fact_id, since],
                    |row| row.get(0),
                )
                .map_err(|e| to_repo_err(e.to_string()))?;

            if distinct_agents < 2 {
                return Ok(false);
            }

            let tx = conn.unchecked_transaction().map_err(|e| to_repo_err(e.to_string()))?;
            apply_reinforcement(&tx, fact_id, AccessType::Reference.weight())?;
            tx.commit().map_err(|e| to_repo_err(e.to_string()))?;
            Ok(true)
        })
    }
}

/// Applies weighted reinforcement to a single fact within an existing
/// transaction. Weight ≥ 1 snaps `last_reinforced` to now; otherwise it moves
/// forward by `weight * elapsed`, clamped to now. No-op for superseded facts.
fn apply_reinforcement(tx: &rusqlite::Connection, fact_id: i64, weight: f64) -> CortexResult<()> {
    let row: Option<(String, DateTime<Utc>)> = tx
        .query_row(
            "SELECT state, last_reinforced FROM facts WHERE id = ?1",
            params![fact_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| to_repo_err(e.to_string()))?;

    let Some((state, last_reinforced)) = row else {
        return Err(CortexError::FactNotFound(fact_id));
    };
    if state == "superseded" {
        return Ok(());
    }

    let now = Utc::now();
    let new_last_reinforced = if weight >= 1.0 {
        now
    } else {
        let elapsed = now - last_reinforced;
        let elapsed_ms = elapsed.num_milliseconds().max(0) as f64;
        let advanced_ms = (weight * elapsed_ms) as i64;
        (last_reinforced + Duration::milliseconds(advanced_ms)).min(now)
    };

    tx.execute(
        "UPDATE facts SET last_reinforced = ?1 WHERE id = ?2",
        params![new_last_reinforced, fact_id],
    )
    .map_err(|e| to_repo_err(e.to_string()))?;
    Ok(())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::model::FactType;
    use cortex_storage::StorageEngine;

    fn repo() -> (StorageEngine, FactRepository) {
        let engine = StorageEngine::open_in_memory().unwrap();
        let repo = FactRepository::new(engine.pool_arc());
        (engine, repo)
    }

    fn seed_memory(engine: &StorageEngine) -> i64 {
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "INSERT INTO memories (content, source_file, content_hash, project, memory_class, imported_at, updated_at)
                     VALUES ('hello', 'a.md', 'h1', 'p', 'note', ?1, ?1)",
                    params![Utc::now()],
                )
                .unwrap();
                Ok::<_, CortexError>(conn.last_insert_rowid())
            })
            .unwrap()
    }

    #[test]
    fn add_then_get_round_trips() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        let id = repo
            .add(NewFact::new(memory_id, "Quinn", "lives_in", "Philadelphia", FactType::Location))
            .unwrap();
        let fact = repo.get(id).unwrap().unwrap();
        assert_eq!(fact.subject, "Quinn");
        assert_eq!(fact.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(fact.decay_rate, DEFAULT_DECAY_RATE);
        assert_eq!(fact.state, FactState::Active);
    }

    #[test]
    fn supersede_rejects_self_reference() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        let id = repo
            .add(NewFact::new(memory_id, "Q", "p", "o", FactType::Kv))
            .unwrap();
        assert!(repo.supersede(id, id, "noop").is_err());
    }

    #[test]
    fn supersede_sets_invariants_and_logs_event() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        let old = repo.add(NewFact::new(memory_id, "Q", "p", "old", FactType::Kv)).unwrap();
        let new = repo.add(NewFact::new(memory_id, "Q", "p", "new", FactType::Kv)).unwrap();

        repo.supersede(old, new, "dedup-facts similarity=1.00").unwrap();

        let old_fact = repo.get(old).unwrap().unwrap();
        assert_eq!(old_fact.state, FactState::Superseded);
        assert_eq!(old_fact.confidence, 0.0);
        assert_eq!(old_fact.superseded_by, Some(new));
        assert!(old_fact.supersession_invariant_holds());

        let event_count: i64 = engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM memory_events WHERE fact_id = ?1",
                    params![old],
                    |r| r.get(0),
                )
                .map_err(|e| CortexError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(event_count, 1);
    }

    #[test]
    fn supersede_is_idempotent_on_edge_conflict() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        let a = repo.add(NewFact::new(memory_id, "Q", "p", "a", FactType::Kv)).unwrap();
        let b = repo.add(NewFact::new(memory_id, "Q", "p", "b", FactType::Kv)).unwrap();
        let c = repo.add(NewFact::new(memory_id, "Q", "p", "c", FactType::Kv)).unwrap();

        repo.supersede(a, c, "r1").unwrap();
        // Insert the same supersedes edge a second time (c -> a) by re-adding a
        // would be blocked by state check; instead exercise the edge uniqueness
        // path directly via a fresh pair sharing the same (source, target, type).
        repo.supersede(b, c, "r2").unwrap();
        let b_fact = repo.get(b).unwrap().unwrap();
        assert_eq!(b_fact.state, FactState::Superseded);
    }

    #[test]
    fn record_access_reinforce_snaps_to_now() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        let id = repo.add(NewFact::new(memory_id, "Q", "p", "o", FactType::Kv)).unwrap();

        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "UPDATE facts SET last_reinforced = ?1 WHERE id = ?2",
                    params![Utc::now() - Duration::days(10), id],
                )
                .map_err(|e| CortexError::Storage(e.to_string()))
            })
            .unwrap();

        repo.record_access(id, "agent-a", AccessType::Reinforce).unwrap();
        let fact = repo.get(id).unwrap().unwrap();
        assert!(Utc::now() - fact.last_reinforced < Duration::seconds(5));
    }

    #[test]
    fn record_access_search_moves_partially() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        let id = repo.add(NewFact::new(memory_id, "Q", "p", "o", FactType::Kv)).unwrap();
        let start = Utc::now() - Duration::days(10);
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "UPDATE facts SET last_reinforced = ?1 WHERE id = ?2",
                    params![start, id],
                )
                .map_err(|e| CortexError::Storage(e.to_string()))
            })
            .unwrap();

        repo.record_access(id, "agent-a", AccessType::Search).unwrap();
        let fact = repo.get(id).unwrap().unwrap();
        assert!(fact.last_reinforced > start);
        assert!(fact.last_reinforced < Utc::now());
    }

    #[test]
    fn record_access_is_noop_for_superseded_fact() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        let old = repo.add(NewFact::new(memory_id, "Q", "p", "old", FactType::Kv)).unwrap();
        let new = repo.add(NewFact::new(memory_id, "Q", "p", "new", FactType::Kv)).unwrap();
        repo.supersede(old, new, "r").unwrap();

        repo.record_access(old, "agent-a", AccessType::Reinforce).unwrap();
        let fact = repo.get(old).unwrap().unwrap();
        assert_eq!(fact.confidence, 0.0);
    }

    #[test]
    fn cross_agent_amplification_requires_two_distinct_agents() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        let id = repo.add(NewFact::new(memory_id, "Q", "p", "o", FactType::Kv)).unwrap();

        repo.record_access(id, "agent-a", AccessType::Search).unwrap();
        assert!(!repo.check_cross_agent(id, None).unwrap());

        repo.record_access(id, "agent-b", AccessType::Search).unwrap();
        assert!(repo.check_cross_agent(id, None).unwrap());
    }

    #[test]
    fn list_excludes_superseded_by_default() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        let old = repo.add(NewFact::new(memory_id, "Q", "p", "old", FactType::Kv)).unwrap();
        let new = repo.add(NewFact::new(memory_id, "Q", "p", "new", FactType::Kv)).unwrap();
        repo.supersede(old, new, "r").unwrap();

        let facts = repo.list(&ListFactsOptions::new()).unwrap();
        assert!(facts.iter().all(|f| f.state != FactState::Superseded));
        assert!(facts.iter().any(|f| f.id == new));
    }

    #[test]
    fn list_filters_by_fact_type() {
        let (engine, repo) = repo();
        let memory_id = seed_memory(&engine);
        repo.add(NewFact::new(memory_id, "Q", "p", "o1", FactType::Kv)).unwrap();
        repo.add(NewFact::new(memory_id, "Q", "lives_in", "o2", FactType::Location)).unwrap();

        let mut opts = ListFactsOptions::new();
        opts.fact_type = Some(FactType::Location);
        let facts = repo.list(&opts).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].fact_type, FactType::Location);
    }
}
