use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults;

/// Webhook notifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Empty ⇒ notifier disabled. Falls back to `CORTEX_ALERT_WEBHOOK_URL` if unset.
    pub url: String,
    pub extra_headers: Vec<(String, String)>,
    pub batch_window_secs: u64,
    pub retry_delay_secs: u64,
}

impl WebhookConfig {
    pub fn batch_window(&self) -> Duration {
        Duration::from_secs(self.batch_window_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            extra_headers: Vec::new(),
            batch_window_secs: defaults::DEFAULT_WEBHOOK_BATCH_WINDOW_SECS,
            retry_delay_secs: defaults::DEFAULT_WEBHOOK_RETRY_DELAY_SECS,
        }
    }
}
