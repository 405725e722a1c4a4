use serde::{Deserialize, Serialize};

use super::defaults;

/// Storage engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file. `:memory:` opens a transient database.
    pub db_path: String,
    pub busy_timeout_ms: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
    pub retry_max_attempts: u32,
    /// Seconds a process waits polling another process's in-progress migration claim.
    pub migration_claim_poll_secs: u64,
    /// Opens the database read-only, skipping WAL/synchronous pragmas and all migrations.
    pub read_only: bool,
    pub batch_size: usize,
    pub list_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: defaults::DEFAULT_DB_FILENAME.to_string(),
            busy_timeout_ms: defaults::DEFAULT_BUSY_TIMEOUT_MS,
            retry_initial_backoff_ms: defaults::DEFAULT_RETRY_INITIAL_BACKOFF_MS,
            retry_max_backoff_ms: defaults::DEFAULT_RETRY_MAX_BACKOFF_MS,
            retry_max_attempts: defaults::DEFAULT_RETRY_MAX_ATTEMPTS,
            migration_claim_poll_secs: defaults::DEFAULT_MIGRATION_CLAIM_POLL_SECS,
            read_only: false,
            batch_size: defaults::DEFAULT_BATCH_SIZE,
            list_limit: defaults::DEFAULT_LIST_LIMIT,
        }
    }
}
