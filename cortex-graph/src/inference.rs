use std::collections::HashMap;
use std::sync::Arc;

use cortex_core::config::AlertsConfig;
use cortex_core::config::defaults::DEFAULT_MIN_COOCCURRENCE_COUNT;
use cortex_core::errors::CortexResult;
use cortex_core::model::{EdgeSource, EdgeType, Fact, FactEdge};
use cortex_facts::{normalize_group_key, FactRepository};
use cortex_storage::ConnectionPool;

use crate::cooccurrence::CooccurrenceStore;
use crate::edges::EdgeRepository;

/// Confidence assigned to a cooccurrence-derived `relates_to` edge: rises
/// with the observed pair count, capped at 0.9.
fn cooccurrence_confidence(count: i64) -> f64 {
    (0.5 + 0.02 * (count - DEFAULT_MIN_COOCCURRENCE_COUNT) as f64).clamp(0.0, 0.9)
}

const SUBJECT_CLUSTER_CONFIDENCE: f64 = 0.4;
const SUBJECT_CLUSTER_SAMPLE: usize = 10;
const SUPERSESSION_CONFIDENCE: f64 = 0.6;
const SUPERSESSION_SAMPLE: usize = 5;

#[derive(Debug, Clone)]
pub struct InferenceOptions {
    pub dry_run: bool,
    pub min_confidence: f64,
    pub max_edges: usize,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        let alerts = AlertsConfig::default();
        Self {
            dry_run: true,
            min_confidence: alerts.inference_min_confidence,
            max_edges: alerts.inference_max_edges,
        }
    }
}

/// Edges a rule either proposed (`dry_run`) or inserted, keyed by rule name.
#[derive(Debug, Clone, Default)]
pub struct InferenceReport {
    pub rules_applied: HashMap<String, usize>,
    pub edges_inserted: usize,
}

/// Applies the three inference rules in order — cooccurrence, subject
/// clustering, supersession — stopping once `opts.max_edges` proposals have
/// been made across all rules. `EdgeExists` collisions are skipped, not
/// treated as errors.
pub fn run(pool: &Arc<ConnectionPool>, opts: &InferenceOptions) -> CortexResult<InferenceReport> {
    let facts_repo = FactRepository::new(pool.clone());
    let edges_repo = EdgeRepository::new(pool.clone());
    let cooccurrence = CooccurrenceStore::new(pool.clone());

    let mut report = InferenceReport::default();
    let mut budget = opts.max_edges;

    run_cooccurrence_rule(&cooccurrence, &edges_repo, opts, &mut budget, &mut report)?;
    if budget > 0 {
        run_subject_clustering_rule(&facts_repo, &edges_repo, opts, &mut budget, &mut report)?;
    }
    if budget > 0 {
        run_supersession_rule(&facts_repo, &edges_repo, opts, &mut budget, &mut report)?;
    }

    Ok(report)
}

fn propose_edge(
    edges_repo: &EdgeRepository,
    source_fact_id: i64,
    target_fact_id: i64,
    edge_type: EdgeType,
    confidence: f64,
    dry_run: bool,
    rule: &str,
    budget: &mut usize,
    report: &mut InferenceReport,
) -> CortexResult<()> {
    *report.rules_applied.entry(rule.to_string()).or_default() += 1;
    *budget -= 1;

    if dry_run {
        return Ok(());
    }

    let Ok(mut edge) = FactEdge::new(source_fact_id, target_fact_id, edge_type) else {
        return Ok(());
    };
    edge.confidence = confidence;
    edge.source = EdgeSource::Inferred;

    match edges_repo.add(&edge) {
        Ok(_) => {
            report.edges_inserted += 1;
            Ok(())
        }
        Err(e) if e.is_conflict() => Ok(()),
        Err(e) => Err(e),
    }
}

fn run_cooccurrence_rule(
    cooccurrence: &CooccurrenceStore,
    edges_repo: &EdgeRepository,
    opts: &InferenceOptions,
    budget: &mut usize,
    report: &mut InferenceReport,
) -> CortexResult<()> {
    for suggestion in cooccurrence.suggest(DEFAULT_MIN_COOCCURRENCE_COUNT)? {
        if *budget == 0 {
            break;
        }
        let confidence = cooccurrence_confidence(suggestion.pair.count);
        if confidence < opts.min_confidence {
            continue;
        }
        propose_edge(
            edges_repo,
            suggestion.pair.a,
            suggestion.pair.b,
            EdgeType::RelatesTo,
            confidence,
            opts.dry_run,
            "cooccurrence_relates_to",
            budget,
            report,
        )?;
    }
    Ok(())
}

fn run_subject_clustering_rule(
    facts_repo: &FactRepository,
    edges_repo: &EdgeRepository,
    opts: &InferenceOptions,
    budget: &mut usize,
    report: &mut InferenceReport,
) -> CortexResult<()> {
    if SUBJECT_CLUSTER_CONFIDENCE < opts.min_confidence {
        return Ok(());
    }

    let active = facts_repo.list_active()?;
    let mut by_subject: HashMap<String, Vec<&Fact>> = HashMap::new();
    for fact in &active {
        by_subject.entry(normalize_group_key(&fact.subject)).or_default().push(fact);
    }

    for mut group in by_subject.into_values() {
        let distinct_predicates: std::collections::HashSet<&str> =
            group.iter().map(|f| f.predicate.as_str()).collect();
        if distinct_predicates.len() < 2 {
            continue;
        }

        group.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        group.truncate(SUBJECT_CLUSTER_SAMPLE);

        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                if *budget == 0 {
                    return Ok(());
                }
                propose_edge(
                    edges_repo,
                    group[i].id,
                    group[j].id,
                    EdgeType::RelatesTo,
                    SUBJECT_CLUSTER_CONFIDENCE,
                    opts.dry_run,
                    "subject_clustering_relates_to",
                    budget,
                    report,
                )?;
            }
        }
    }
    Ok(())
}

fn run_supersession_rule(
    facts_repo: &FactRepository,
    edges_repo: &EdgeRepository,
    opts: &InferenceOptions,
    budget: &mut usize,
    report: &mut InferenceReport,
) -> CortexResult<()> {
    if SUPERSESSION_CONFIDENCE < opts.min_confidence {
        return Ok(());
    }

    let active = facts_repo.list_active()?;
    let mut by_subject_predicate: HashMap<(String, String), Vec<&Fact>> = HashMap::new();
    for fact in &active {
        by_subject_predicate
            .entry((normalize_group_key(&fact.subject), normalize_group_key(&fact.predicate)))
            .or_default()
            .push(fact);
    }

    for mut group in by_subject_predicate.into_values() {
        let distinct_objects: std::collections::HashSet<&str> = group.iter().map(|f| f.object.as_str()).collect();
        if distinct_objects.len() < 2 {
            continue;
        }

        group.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        group.truncate(SUPERSESSION_SAMPLE);

        let Some((newest, older)) = group.split_first() else {
            continue;
        };
        for fact in older {
            if fact.object == newest.object {
                continue;
            }
            if *budget == 0 {
                return Ok(());
            }
            propose_edge(
                edges_repo,
                newest.id,
                fact.id,
                EdgeType::Supersedes,
                SUPERSESSION_CONFIDENCE,
                opts.dry_run,
                "supersession_supersedes",
                budget,
                report,
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::errors::CortexError;
    use cortex_core::model::FactType;
    use cortex_facts::NewFact;
    use cortex_storage::StorageEngine;
    use rusqlite::params;

    fn seed_memory(engine: &StorageEngine) -> i64 {
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
                Ok::<_, CortexError>(conn.last_insert_rowid())
            })
            .unwrap()
    }

    #[test]
    fn cooccurrence_rule_creates_relates_to_edge_above_threshold() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let pool = engine.pool_arc();
        let memory_id = seed_memory(&engine);
        let facts = FactRepository::new(pool.clone());
        let a = facts.add(NewFact::new(memory_id, "a", "p", "o1", FactType::Kv)).unwrap();
        let b = facts.add(NewFact::new(memory_id, "b", "p", "o2", FactType::Kv)).unwrap();

        let cooccurrence = CooccurrenceStore::new(pool.clone());
        for _ in 0..6 {
            cooccurrence.record(a, b).unwrap();
        }

        let opts = InferenceOptions {
            dry_run: false,
            min_confidence: 0.0,
            max_edges: 100,
        };
        let report = run(&pool, &opts).unwrap();
        assert_eq!(report.rules_applied.get("cooccurrence_relates_to"), Some(&1));
        assert_eq!(report.edges_inserted, 1);
    }

    #[test]
    fn dry_run_proposes_without_inserting() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let pool = engine.pool_arc();
        let memory_id = seed_memory(&engine);
        let facts = FactRepository::new(pool.clone());
        let a = facts.add(NewFact::new(memory_id, "a", "p", "o1", FactType::Kv)).unwrap();
        let b = facts.add(NewFact::new(memory_id, "b", "p", "o2", FactType::Kv)).unwrap();
        let cooccurrence = CooccurrenceStore::new(pool.clone());
        for _ in 0..6 {
            cooccurrence.record(a, b).unwrap();
        }

        let opts = InferenceOptions {
            dry_run: true,
            min_confidence: 0.0,
            max_edges: 100,
        };
        let report = run(&pool, &opts).unwrap();
        assert_eq!(report.rules_applied.get("cooccurrence_relates_to"), Some(&1));
        assert_eq!(report.edges_inserted, 0);
    }

    #[test]
    fn subject_clustering_rule_links_facts_sharing_subject_and_multiple_predicates() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let pool = engine.pool_arc();
        let memory_id = seed_memory(&engine);
        let facts = FactRepository::new(pool.clone());
        facts.add(NewFact::new(memory_id, "Quinn", "lives_in", "Philly", FactType::Location)).unwrap();
        facts.add(NewFact::new(memory_id, "Quinn", "likes", "coffee", FactType::Preference)).unwrap();

        let opts = InferenceOptions {
            dry_run: false,
            min_confidence: 0.0,
            max_edges: 100,
        };
        let report = run(&pool, &opts).unwrap();
        assert_eq!(report.rules_applied.get("subject_clustering_relates_to"), Some(&1));
    }

    #[test]
    fn supersession_rule_links_newest_to_older_distinct_objects() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let pool = engine.pool_arc();
        let memory_id = seed_memory(&engine);
        let facts = FactRepository::new(pool.clone());
        let old = facts.add(NewFact::new(memory_id, "Quinn", "role", "engineer", FactType::Identity)).unwrap();
        let newer = facts.add(NewFact::new(memory_id, "Quinn", "role", "manager", FactType::Identity)).unwrap();
        // Force a distinguishable created_at ordering (same-millisecond inserts would tie).
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "UPDATE facts SET created_at = datetime('now', '-1 day') WHERE id = ?1",
                    params![old],
                )
                .unwrap();
                Ok::<_, CortexError>(())
            })
            .unwrap();

        let opts = InferenceOptions {
            dry_run: false,
            min_confidence: 0.0,
            max_edges: 100,
        };
        let report = run(&pool, &opts).unwrap();
        assert_eq!(report.rules_applied.get("supersession_supersedes"), Some(&1));

        let edge_repo = EdgeRepository::new(pool.clone());
        let edges = edge_repo.edges_for_fact(newer, 0.0).unwrap();
        assert!(edges.iter().any(|e| e.source_fact_id == newer && e.target_fact_id == old));
    }

    #[test]
    fn max_edges_caps_total_proposals_across_rules() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let pool = engine.pool_arc();
        let memory_id = seed_memory(&engine);
        let facts = FactRepository::new(pool.clone());
        let a = facts.add(NewFact::new(memory_id, "a", "p", "o1", FactType::Kv)).unwrap();
        let b = facts.add(NewFact::new(memory_id, "b", "p", "o2", FactType::Kv)).unwrap();
        let cooccurrence = CooccurrenceStore::new(pool.clone());
        for _ in 0..6 {
            cooccurrence.record(a, b).unwrap();
        }
        facts.add(NewFact::new(memory_id, "Quinn", "lives_in", "Philly", FactType::Location)).unwrap();
        facts.add(NewFact::new(memory_id, "Quinn", "likes", "coffee", FactType::Preference)).unwrap();

        let opts = InferenceOptions {
            dry_run: true,
            min_confidence: 0.0,
            max_edges: 1,
        };
        let report = run(&pool, &opts).unwrap();
        let total: usize = report.rules_applied.values().sum();
        assert_eq!(total, 1);
    }
}
