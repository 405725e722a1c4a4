use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::model::{Alert, AlertSeverity, AlertType};
use cortex_storage::ConnectionPool;

fn to_repo_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

/// A new alert prior to insertion.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub fact_id: Option<i64>,
    pub related_fact_id: Option<i64>,
    pub agent_id: Option<String>,
    pub message: String,
    pub detail: String,
}

impl NewAlert {
    pub fn new(alert_type: AlertType, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            alert_type,
            severity,
            fact_id: None,
            related_fact_id: None,
            agent_id: None,
            message: message.into(),
            detail: "{}".to_string(),
        }
    }
}

pub struct AlertRepository {
    pool: Arc<ConnectionPool>,
}

impl AlertRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn insert(&self, alert: NewAlert) -> CortexResult<i64> {
        self.pool.writer.with_conn_sync(|conn| {
            conn.execute(
                "INSERT INTO alerts (alert_type, severity, fact_id, related_fact_id, agent_id, message, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    alert.alert_type.as_str(),
                    alert.severity.as_str(),
                    alert.fact_id,
                    alert.related_fact_id,
                    alert.agent_id.unwrap_or_default(),
                    alert.message,
                    alert.detail,
                ],
            )
            .map_err(|e| to_repo_err(e.to_string()))?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// True when an unacknowledged alert of `alert_type` already references
    /// `fact_id` — used to dedupe repeated decay/conflict scans.
    pub fn has_unacked_for_fact(&self, alert_type: AlertType, fact_id: i64) -> CortexResult<bool> {
        self.pool.readers.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM alerts WHERE alert_type = ?1 AND fact_id = ?2 AND acknowledged = 0",
                    params![alert_type.as_str(), fact_id],
                    |row| row.get(0),
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            Ok(count > 0)
        })
    }

    pub fn acknowledge(&self, alert_id: i64) -> CortexResult<bool> {
        self.pool.writer.with_conn_sync(|conn| {
            let updated = conn
                .execute(
                    "UPDATE alerts SET acknowledged = 1, acknowledged_at = ?1 WHERE id = ?2 AND acknowledged = 0",
                    params![Utc::now(), alert_id],
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            Ok(updated > 0)
        })
    }

    pub fn get(&self, alert_id: i64) -> CortexResult<Option<Alert>> {
        self.pool.readers.with_conn(|conn| {
            conn.query_row(
                "SELECT id, alert_type, severity, fact_id, related_fact_id, agent_id, message, detail,
                        acknowledged, acknowledged_at, created_at
                 FROM alerts WHERE id = ?1",
                params![alert_id],
                alert_from_row,
            )
            .optional()
            .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    pub fn list_unacked(&self) -> CortexResult<Vec<Alert>> {
        self.pool.readers.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, alert_type, severity, fact_id, related_fact_id, agent_id, message, detail,
                            acknowledged, acknowledged_at, created_at
                     FROM alerts WHERE acknowledged = 0 ORDER BY created_at DESC",
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            let rows = stmt.query_map([], alert_from_row).map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| to_repo_err(e.to_string()))
        })
    }
}

fn alert_from_row(row: &rusqlite::Row) -> rusqlite::Result<Alert> {
    let alert_type: String = row.get(1)?;
    let severity: String = row.get(2)?;
    let agent_id: String = row.get(5)?;
    Ok(Alert {
        id: row.get(0)?,
        alert_type: AlertType::parse(&alert_type).map_err(to_sqlite_err)?,
        severity: parse_severity(&severity).map_err(to_sqlite_err)?,
        fact_id: row.get(3)?,
        related_fact_id: row.get(4)?,
        agent_id: if agent_id.is_empty() { None } else { Some(agent_id) },
        message: row.get(6)?,
        detail: row.get(7)?,
        acknowledged: row.get::<_, i64>(8)? != 0,
        acknowledged_at: row.get::<_, Option<DateTime<Utc>>>(9)?,
        created_at: row.get::<_, DateTime<Utc>>(10)?,
    })
}

fn parse_severity(s: &str) -> CortexResult<AlertSeverity> {
    Ok(match s {
        "info" => AlertSeverity::Info,
        "warning" => AlertSeverity::Warning,
        "critical" => AlertSeverity::Critical,
        other => return Err(CortexError::Storage(format!("invalid alert severity: {other}"))),
    })
}

fn to_sqlite_err(e: CortexError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_storage::StorageEngine;

    #[test]
    fn insert_and_dedupe_unacked() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let repo = AlertRepository::new(engine.pool_arc());

        let mut alert = NewAlert::new(AlertType::Decay, AlertSeverity::Warning, "fading");
        alert.fact_id = Some(1);
        let id = repo.insert(alert).unwrap();
        assert!(repo.has_unacked_for_fact(AlertType::Decay, 1).unwrap());

        repo.acknowledge(id).unwrap();
        assert!(!repo.has_unacked_for_fact(AlertType::Decay, 1).unwrap());
    }

    #[test]
    fn acknowledge_is_idempotent() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let repo = AlertRepository::new(engine.pool_arc());
        let id = repo.insert(NewAlert::new(AlertType::Match, AlertSeverity::Info, "hit")).unwrap();
        assert!(repo.acknowledge(id).unwrap());
        assert!(!repo.acknowledge(id).unwrap());
    }
}
