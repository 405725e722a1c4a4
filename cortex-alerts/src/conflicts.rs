use std::sync::Arc;

use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::model::{Alert, AlertSeverity, AlertType, Fact};
use cortex_storage::ConnectionPool;

use crate::repository::{AlertRepository, NewAlert};

fn to_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

const CONFLICTS_PER_FACT_LIMIT: usize = 20;
const PAIRS_PER_GROUP_LIMIT: usize = 10;

/// Two active facts sharing subject+predicate but disagreeing on object.
#[derive(Debug, Clone)]
pub struct ConflictReport {
    pub fact_a: i64,
    pub fact_b: i64,
    pub subject: String,
    pub predicate: String,
    pub object_a: String,
    pub object_b: String,
    pub cross_agent: bool,
}

/// Active facts with the same (lowercased subject, lowercased predicate) as
/// `fact` but a different object — at most 20.
pub fn check_conflicts_for_fact(pool: &Arc<ConnectionPool>, fact: &Fact) -> CortexResult<Vec<ConflictReport>> {
    pool.readers.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT id, object, agent_id FROM facts
                 WHERE state = 'active' AND id != ?1
                   AND LOWER(subject) = LOWER(?2) AND LOWER(predicate) = LOWER(?3)
                   AND object != ?4
                 LIMIT ?5",
            )
            .map_err(|e| to_err(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::params![fact.id, fact.subject, fact.predicate, fact.object, CONFLICTS_PER_FACT_LIMIT as i64],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .map_err(|e| to_err(e.to_string()))?;

        let mut reports = Vec::new();
        for row in rows {
            let (other_id, other_object, other_agent) = row.map_err(|e| to_err(e.to_string()))?;
            reports.push(ConflictReport {
                fact_a: fact.id,
                fact_b: other_id,
                subject: fact.subject.clone(),
                predicate: fact.predicate.clone(),
                object_a: fact.object.clone(),
                object_b: other_object,
                cross_agent: !fact.agent_id.is_empty() && !other_agent.is_empty() && fact.agent_id != other_agent,
            });
        }
        Ok(reports)
    })
}

/// Two-phase scan across the whole `facts` table: phase 1 finds
/// (subject, predicate) pairs with more than one distinct object (cheap,
/// aggregate-only); phase 2 fetches up to 10 facts per pair and emits one
/// report per distinct-object pairing.
pub fn get_attribute_conflicts(pool: &Arc<ConnectionPool>, limit: usize) -> CortexResult<Vec<ConflictReport>> {
    pool.readers.with_conn(|conn| {
        let mut group_stmt = conn
            .prepare(
                "SELECT subject, predicate FROM facts
                 WHERE state = 'active'
                 GROUP BY LOWER(subject), LOWER(predicate)
                 HAVING COUNT(DISTINCT object) > 1
                 LIMIT ?1",
            )
            .map_err(|e| to_err(e.to_string()))?;
        let groups: Vec<(String, String)> = group_stmt
            .query_map(rusqlite::params![limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| to_err(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| to_err(e.to_string()))?;

        let mut reports = Vec::new();
        for (subject, predicate) in groups {
            let mut pair_stmt = conn
                .prepare(
                    "SELECT id, object, agent_id FROM facts
                     WHERE state = 'active' AND LOWER(subject) = LOWER(?1) AND LOWER(predicate) = LOWER(?2)
                     LIMIT ?3",
                )
                .map_err(|e| to_err(e.to_string()))?;
            let facts: Vec<(i64, String, String)> = pair_stmt
                .query_map(rusqlite::params![subject, predicate, PAIRS_PER_GROUP_LIMIT as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })
                .map_err(|e| to_err(e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| to_err(e.to_string()))?;

            for i in 0..facts.len() {
                for j in (i + 1)..facts.len() {
                    let (id_a, object_a, agent_a) = &facts[i];
                    let (id_b, object_b, agent_b) = &facts[j];
                    if object_a == object_b {
                        continue;
                    }
                    reports.push(ConflictReport {
                        fact_a: *id_a,
                        fact_b: *id_b,
                        subject: subject.clone(),
                        predicate: predicate.clone(),
                        object_a: object_a.clone(),
                        object_b: object_b.clone(),
                        cross_agent: !agent_a.is_empty() && !agent_b.is_empty() && agent_a != agent_b,
                    });
                }
            }
        }
        Ok(reports)
    })
}

/// Writes a `conflict` alert for `report`, deduplicated against any
/// unacknowledged conflict alert already referencing `report.fact_a`.
/// Cross-agent conflicts are escalated to `critical`.
pub fn raise_conflict_alert(alerts: &AlertRepository, report: &ConflictReport) -> CortexResult<Option<Alert>> {
    if alerts.has_unacked_for_fact(AlertType::Conflict, report.fact_a)? {
        return Ok(None);
    }

    let severity = if report.cross_agent { AlertSeverity::Critical } else { AlertSeverity::Warning };
    let message = format!(
        "conflicting facts for {} {}: \"{}\" vs \"{}\"",
        report.subject, report.predicate, report.object_a, report.object_b
    );

    let mut alert = NewAlert::new(AlertType::Conflict, severity, message);
    alert.fact_id = Some(report.fact_a);
    alert.related_fact_id = Some(report.fact_b);
    alert.detail = serde_json::json!({ "cross_agent": report.cross_agent }).to_string();

    let id = alerts.insert(alert)?;
    alerts.get(id)
}
