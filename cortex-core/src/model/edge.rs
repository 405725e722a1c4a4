use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CortexError, CortexResult};

/// Typed relationship between two facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactEdge {
    pub id: i64,
    pub source_fact_id: i64,
    pub target_fact_id: i64,
    pub edge_type: EdgeType,
    pub confidence: f64,
    pub source: EdgeSource,
    pub agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FactEdge {
    pub fn new(source_fact_id: i64, target_fact_id: i64, edge_type: EdgeType) -> CortexResult<Self> {
        if source_fact_id == target_fact_id {
            return Err(CortexError::SelfLoop(source_fact_id));
        }
        Ok(Self {
            id: 0,
            source_fact_id,
            target_fact_id,
            edge_type,
            confidence: 1.0,
            source: EdgeSource::Explicit,
            agent_id: None,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Supports,
    Contradicts,
    RelatesTo,
    Supersedes,
    DerivedFrom,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Supports => "supports",
            EdgeType::Contradicts => "contradicts",
            EdgeType::RelatesTo => "relates_to",
            EdgeType::Supersedes => "supersedes",
            EdgeType::DerivedFrom => "derived_from",
        }
    }

    pub fn parse(s: &str) -> CortexResult<Self> {
        Ok(match s {
            "supports" => EdgeType::Supports,
            "contradicts" => EdgeType::Contradicts,
            "relates_to" => EdgeType::RelatesTo,
            "supersedes" => EdgeType::Supersedes,
            "derived_from" => EdgeType::DerivedFrom,
            other => return Err(CortexError::InvalidEdgeType(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    Explicit,
    Detected,
    Inferred,
}

impl EdgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeSource::Explicit => "explicit",
            EdgeSource::Detected => "detected",
            EdgeSource::Inferred => "inferred",
        }
    }

    pub fn parse(s: &str) -> CortexResult<Self> {
        Ok(match s {
            "explicit" => EdgeSource::Explicit,
            "detected" => EdgeSource::Detected,
            "inferred" => EdgeSource::Inferred,
            other => return Err(CortexError::InvalidEdgeType(other.to_string())),
        })
    }
}

/// Undirected weighted edge over facts, canonically ordered `a < b`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CooccurrencePair {
    pub a: i64,
    pub b: i64,
    pub count: i64,
    pub last_seen: DateTime<Utc>,
}

impl CooccurrencePair {
    /// Canonically order a pair so `a < b`. Returns `None` for `a == b` or
    /// either id ≤ 0.
    pub fn canonical(x: i64, y: i64) -> Option<(i64, i64)> {
        if x == y || x <= 0 || y <= 0 {
            return None;
        }
        Some(if x < y { (x, y) } else { (y, x) })
    }
}
