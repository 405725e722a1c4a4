use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only differential log of change events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub id: i64,
    pub event_type: EventType,
    /// The fact this event concerns, if any.
    pub fact_id: Option<i64>,
    /// The memory this event concerns, if any.
    pub memory_id: Option<i64>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Add,
    Update,
    Merge,
    Decay,
    Delete,
    Reinforce,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Add => "add",
            EventType::Update => "update",
            EventType::Merge => "merge",
            EventType::Decay => "decay",
            EventType::Delete => "delete",
            EventType::Reinforce => "reinforce",
        }
    }
}
