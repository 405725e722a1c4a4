use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CortexError, CortexResult};

/// A persistent query that matches against newly imported memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchQuery {
    pub id: i64,
    pub query: String,
    pub threshold: f64,
    pub delivery_channel: DeliveryChannel,
    pub webhook_url: Option<String>,
    pub agent_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_matched_at: Option<DateTime<Utc>>,
    pub match_count: i64,
}

impl WatchQuery {
    pub fn new(query: impl Into<String>, threshold: f64) -> CortexResult<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(CortexError::EmptyWatchQuery);
        }
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(CortexError::InvalidThreshold(threshold));
        }
        Ok(Self {
            id: 0,
            query,
            threshold,
            delivery_channel: DeliveryChannel::Alert,
            webhook_url: None,
            agent_id: None,
            active: true,
            created_at: Utc::now(),
            last_matched_at: None,
            match_count: 0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Alert,
    Webhook,
    Mcp,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Alert => "alert",
            DeliveryChannel::Webhook => "webhook",
            DeliveryChannel::Mcp => "mcp",
        }
    }

    pub fn parse(s: &str) -> CortexResult<Self> {
        Ok(match s {
            "alert" => DeliveryChannel::Alert,
            "webhook" => DeliveryChannel::Webhook,
            "mcp" => DeliveryChannel::Mcp,
            other => return Err(CortexError::InvalidDeliveryChannel(other.to_string())),
        })
    }
}
