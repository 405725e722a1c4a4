use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CortexError, CortexResult};

/// A user-visible notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub fact_id: Option<i64>,
    pub related_fact_id: Option<i64>,
    /// `None`/`""` = broadcast.
    pub agent_id: Option<String>,
    pub message: String,
    pub detail: String,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Conflict,
    Decay,
    Match,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Conflict => "conflict",
            AlertType::Decay => "decay",
            AlertType::Match => "match",
        }
    }

    pub fn parse(s: &str) -> CortexResult<Self> {
        Ok(match s {
            "conflict" => AlertType::Conflict,
            "decay" => AlertType::Decay,
            "match" => AlertType::Match,
            other => return Err(CortexError::InvalidAlertType(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}
