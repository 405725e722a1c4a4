use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::params;

use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::model::{Alert, AlertSeverity, AlertType};
use cortex_storage::ConnectionPool;

use crate::repository::{AlertRepository, NewAlert};

fn to_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

#[derive(Debug, Clone, Copy)]
pub struct DecayThresholds {
    pub critical: f64,
    pub warning: f64,
}

struct FadingFact {
    id: i64,
    subject: String,
    c_eff: f64,
}

fn load_fading_facts(pool: &Arc<ConnectionPool>, thresholds: DecayThresholds) -> CortexResult<Vec<FadingFact>> {
    pool.readers.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT id, subject, confidence, decay_rate, last_reinforced FROM facts
                 WHERE state != 'superseded'",
            )
            .map_err(|e| to_err(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                ))
            })
            .map_err(|e| to_err(e.to_string()))?;

        let now = Utc::now();
        let mut out = Vec::new();
        for row in rows {
            let (id, subject, confidence, decay_rate, last_reinforced) = row.map_err(|e| to_err(e.to_string()))?;
            let days = (now - last_reinforced).num_seconds() as f64 / 86_400.0;
            let c_eff = confidence * (-decay_rate * days.max(0.0)).exp();
            if c_eff < thresholds.warning {
                out.push(FadingFact { id, subject, c_eff });
            }
        }
        Ok(out)
    })
}

/// Scans every active, non-superseded fact and raises a `decay` alert for
/// facts whose effective confidence has fallen below `thresholds.warning`,
/// deduplicated against any unacknowledged decay alert already referencing
/// the fact. Returns the alerts created by this scan.
pub fn check_decay_alerts(
    pool: &Arc<ConnectionPool>,
    alerts: &AlertRepository,
    thresholds: DecayThresholds,
) -> CortexResult<Vec<Alert>> {
    let fading = load_fading_facts(pool, thresholds)?;
    let mut created = Vec::new();

    for fact in fading {
        if alerts.has_unacked_for_fact(AlertType::Decay, fact.id)? {
            continue;
        }
        let severity = if fact.c_eff < thresholds.critical { AlertSeverity::Critical } else { AlertSeverity::Warning };
        let message = format!("fact #{} ({}) has decayed to {:.3} effective confidence", fact.id, fact.subject, fact.c_eff);

        let mut alert = NewAlert::new(AlertType::Decay, severity, message);
        alert.fact_id = Some(fact.id);
        alert.detail = serde_json::json!({ "effective_confidence": fact.c_eff }).to_string();

        let id = alerts.insert(alert)?;
        if let Some(a) = alerts.get(id)? {
            created.push(a);
        }
    }

    Ok(created)
}

#[derive(Debug, Clone)]
pub struct DecayDigestEntry {
    pub subject: String,
    pub worst_effective_confidence: f64,
    pub fact_ids: Vec<i64>,
}

/// Groups fading facts (below `thresholds.warning`) by subject, sorted by
/// worst effective confidence ascending (most urgent first).
pub fn decay_digest(pool: &Arc<ConnectionPool>, thresholds: DecayThresholds) -> CortexResult<Vec<DecayDigestEntry>> {
    let fading = load_fading_facts(pool, thresholds)?;
    let mut by_subject: std::collections::HashMap<String, DecayDigestEntry> = std::collections::HashMap::new();

    for fact in fading {
        let entry = by_subject.entry(fact.subject.clone()).or_insert_with(|| DecayDigestEntry {
            subject: fact.subject.clone(),
            worst_effective_confidence: f64::MAX,
            fact_ids: Vec::new(),
        });
        entry.worst_effective_confidence = entry.worst_effective_confidence.min(fact.c_eff);
        entry.fact_ids.push(fact.id);
    }

    let mut digest: Vec<DecayDigestEntry> = by_subject.into_values().collect();
    digest.sort_by(|a, b| a.worst_effective_confidence.partial_cmp(&b.worst_effective_confidence).unwrap_or(std::cmp::Ordering::Equal));
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_storage::StorageEngine;

    fn seed_fact(engine: &StorageEngine, subject: &str, confidence: f64, decay_rate: f64, days_ago: i64) -> i64 {
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "INSERT INTO memories (content, source_file, content_hash, project, memory_class, imported_at, updated_at)
                     VALUES ('x', 'a.md', ?1, 'p', 'note', datetime('now'), datetime('now'))",
                    params![format!("h-{subject}-{days_ago}")],
                )
                .unwrap();
                let memory_id = conn.last_insert_rowid();
                let last_reinforced = Utc::now() - chrono::Duration::days(days_ago);
                conn.execute(
                    "INSERT INTO facts (memory_id, subject, predicate, object, fact_type, confidence, decay_rate, last_reinforced, created_at, state, agent_id)
                     VALUES (?1, ?2, 'p', 'o', 'kv', ?3, ?4, ?5, datetime('now'), 'active', '')",
                    params![memory_id, subject, confidence, decay_rate, last_reinforced],
                )
                .unwrap();
                Ok::<_, CortexError>(conn.last_insert_rowid())
            })
            .unwrap()
    }

    #[test]
    fn decay_scan_creates_warning_then_dedupes() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let fact_id = seed_fact(&engine, "Quinn", 1.0, 0.01, 80);
        let pool = engine.pool_arc();
        let alerts = AlertRepository::new(pool.clone());
        let thresholds = DecayThresholds { critical: 0.30, warning: 0.50 };

        let first = check_decay_alerts(&pool, &alerts, thresholds).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].severity, AlertSeverity::Warning);
        assert_eq!(first[0].fact_id, Some(fact_id));

        let second = check_decay_alerts(&pool, &alerts, thresholds).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn acknowledged_fact_can_re_alert() {
        let engine = StorageEngine::open_in_memory().unwrap();
        seed_fact(&engine, "Quinn", 1.0, 0.01, 80);
        let pool = engine.pool_arc();
        let alerts = AlertRepository::new(pool.clone());
        let thresholds = DecayThresholds { critical: 0.30, warning: 0.50 };

        let first = check_decay_alerts(&pool, &alerts, thresholds).unwrap();
        alerts.acknowledge(first[0].id).unwrap();

        let second = check_decay_alerts(&pool, &alerts, thresholds).unwrap();
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn severely_decayed_fact_is_critical() {
        let engine = StorageEngine::open_in_memory().unwrap();
        seed_fact(&engine, "Quinn", 1.0, 0.05, 80);
        let pool = engine.pool_arc();
        let alerts = AlertRepository::new(pool.clone());
        let thresholds = DecayThresholds { critical: 0.30, warning: 0.50 };

        let created = check_decay_alerts(&pool, &alerts, thresholds).unwrap();
        assert_eq!(created[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn digest_sorts_worst_first() {
        let engine = StorageEngine::open_in_memory().unwrap();
        seed_fact(&engine, "Quinn", 1.0, 0.01, 40);
        seed_fact(&engine, "Avery", 1.0, 0.05, 80);
        let pool = engine.pool_arc();
        let thresholds = DecayThresholds { critical: 0.30, warning: 0.90 };

        let digest = decay_digest(&pool, thresholds).unwrap();
        assert_eq!(digest[0].subject, "Avery");
    }
}
