use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CortexError, CortexResult};

/// A structured claim extracted from a memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: i64,
    pub memory_id: i64,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub fact_type: FactType,
    pub confidence: f64,
    pub decay_rate: f64,
    pub last_reinforced: DateTime<Utc>,
    pub source_quote: Option<String>,
    pub created_at: DateTime<Utc>,
    pub superseded_by: Option<i64>,
    pub state: FactState,
    /// `""` = global.
    pub agent_id: String,
}

pub const DEFAULT_CONFIDENCE: f64 = 1.0;
pub const DEFAULT_DECAY_RATE: f64 = 0.01;

impl Fact {
    pub fn new(
        memory_id: i64,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        fact_type: FactType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            memory_id,
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            fact_type,
            confidence: DEFAULT_CONFIDENCE,
            decay_rate: DEFAULT_DECAY_RATE,
            last_reinforced: now,
            source_quote: None,
            created_at: now,
            superseded_by: None,
            state: FactState::Active,
            agent_id: String::new(),
        }
    }

    /// Effective confidence: `c_base * exp(-decay_rate * days_since(last_reinforced))`
    ///.
    pub fn effective_confidence_at(&self, now: DateTime<Utc>) -> f64 {
        let days = (now - self.last_reinforced).num_seconds() as f64 / 86_400.0;
        let days = days.max(0.0);
        self.confidence * (-self.decay_rate * days).exp()
    }

    pub fn effective_confidence(&self) -> f64 {
        self.effective_confidence_at(Utc::now())
    }

    pub fn is_superseded(&self) -> bool {
        self.state == FactState::Superseded
    }

    /// Invariant check: superseded ⇒ superseded_by set, confidence 0, state superseded.
    pub fn supersession_invariant_holds(&self) -> bool {
        if self.state == FactState::Superseded {
            self.superseded_by.is_some() && self.confidence == 0.0
        } else {
            true
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactType {
    Kv,
    Relationship,
    Preference,
    Temporal,
    Identity,
    Location,
    Decision,
    State,
}

impl FactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactType::Kv => "kv",
            FactType::Relationship => "relationship",
            FactType::Preference => "preference",
            FactType::Temporal => "temporal",
            FactType::Identity => "identity",
            FactType::Location => "location",
            FactType::Decision => "decision",
            FactType::State => "state",
        }
    }

    pub fn parse(s: &str) -> CortexResult<Self> {
        Ok(match s {
            "kv" => FactType::Kv,
            "relationship" => FactType::Relationship,
            "preference" => FactType::Preference,
            "temporal" => FactType::Temporal,
            "identity" => FactType::Identity,
            "location" => FactType::Location,
            "decision" => FactType::Decision,
            "state" => FactType::State,
            other => return Err(CortexError::InvalidFactType(other.to_string())),
        })
    }

    pub const ALL: [FactType; 8] = [
        FactType::Kv,
        FactType::Relationship,
        FactType::Preference,
        FactType::Temporal,
        FactType::Identity,
        FactType::Location,
        FactType::Decision,
        FactType::State,
    ];
}

/// Fact lifecycle state.
///
/// `active`, `core`, and `retired` are user-settable; `superseded` is only
/// reachable via the supersession operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactState {
    Active,
    Core,
    Retired,
    Superseded,
}

impl FactState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactState::Active => "active",
            FactState::Core => "core",
            FactState::Retired => "retired",
            FactState::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> CortexResult<Self> {
        Ok(match s {
            "active" => FactState::Active,
            "core" => FactState::Core,
            "retired" => FactState::Retired,
            "superseded" => FactState::Superseded,
            other => return Err(CortexError::InvalidFactState(other.to_string())),
        })
    }

    /// User callers may only set active/core/retired directly — `superseded`
    /// is reachable only through `supersede()`.
    pub fn parse_user_settable(s: &str) -> CortexResult<Self> {
        let state = Self::parse(s)?;
        if state == FactState::Superseded {
            return Err(CortexError::InvalidFactState(
                "superseded is not user-settable; use supersede()".to_string(),
            ));
        }
        Ok(state)
    }
}

/// Append-only log of who/when accessed a fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactAccess {
    pub id: i64,
    pub fact_id: i64,
    pub agent_id: String,
    pub access_type: AccessType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Search,
    Reinforce,
    Import,
    Reference,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Search => "search",
            AccessType::Reinforce => "reinforce",
            AccessType::Import => "import",
            AccessType::Reference => "reference",
        }
    }

    pub fn parse(s: &str) -> CortexResult<Self> {
        Ok(match s {
            "search" => AccessType::Search,
            "reinforce" => AccessType::Reinforce,
            "import" => AccessType::Import,
            "reference" => AccessType::Reference,
            other => return Err(CortexError::InvalidAccessType(other.to_string())),
        })
    }

    /// Reinforcement weight used by the weighted-reinforcement operation.
    pub fn weight(&self) -> f64 {
        match self {
            AccessType::Reinforce => 1.0,
            AccessType::Import => 0.8,
            AccessType::Reference => 0.5,
            AccessType::Search => 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_confidence_decays_over_time() {
        let mut f = Fact::new(1, "Q", "lives_in", "Philadelphia", FactType::Location);
        f.confidence = 1.0;
        f.decay_rate = 0.01;
        f.last_reinforced = Utc::now() - chrono::Duration::days(80);
        let c = f.effective_confidence();
        assert!((c - 0.449).abs() < 0.01, "expected ~0.449, got {c}");
    }

    #[test]
    fn superseded_invariant() {
        let mut f = Fact::new(1, "Q", "lives_in", "Philadelphia", FactType::Location);
        assert!(f.supersession_invariant_holds());
        f.state = FactState::Superseded;
        f.confidence = 0.0;
        f.superseded_by = None;
        assert!(!f.supersession_invariant_holds());
        f.superseded_by = Some(2);
        assert!(f.supersession_invariant_holds());
    }

    #[test]
    fn superseded_not_user_settable() {
        assert!(FactState::parse_user_settable("superseded").is_err());
        assert!(FactState::parse_user_settable("active").is_ok());
    }

    #[test]
    fn weights_match_access_type_ordering() {
        assert_eq!(AccessType::Reinforce.weight(), 1.0);
        assert_eq!(AccessType::Import.weight(), 0.8);
        assert_eq!(AccessType::Reference.weight(), 0.5);
        assert_eq!(AccessType::Search.weight(), 0.3);
    }
}
