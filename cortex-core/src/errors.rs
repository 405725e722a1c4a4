//! Error sentinels exposed at the storage/engine boundary.
//!
//! Three tiers:
//! 1. Validation (caller bug) — never retried.
//! 2. Conflict (expected) — callers treat as "skip, not error".
//! 3. Transient (storage) — retried with backoff inside the storage layer.

use thiserror::Error;

pub type CortexResult<T> = Result<T, CortexError>;

#[derive(Debug, Error)]
pub enum CortexError {
    // --- Tier 2: conflicts, expected and non-fatal to callers ---
    #[error("edge already exists between {source_fact_id} and {target_fact_id} ({edge_type})")]
    EdgeExists {
        source_fact_id: i64,
        target_fact_id: i64,
        edge_type: String,
    },

    #[error("duplicate content hash: {hash}")]
    DuplicateHash { hash: String },

    // --- Tier 1: validation ---
    #[error("content must not be empty")]
    EmptyContent,

    #[error("invalid memory class: {0}")]
    InvalidMemoryClass(String),

    #[error("invalid fact state: {0}")]
    InvalidFactState(String),

    #[error("invalid fact type: {0}")]
    InvalidFactType(String),

    #[error("invalid edge type: {0}")]
    InvalidEdgeType(String),

    #[error("invalid access type: {0}")]
    InvalidAccessType(String),

    #[error("invalid alert type: {0}")]
    InvalidAlertType(String),

    #[error("invalid delivery channel: {0}")]
    InvalidDeliveryChannel(String),

    #[error("self-loop not allowed: fact {0} cannot relate to itself")]
    SelfLoop(i64),

    #[error("watch query text must not be empty")]
    EmptyWatchQuery,

    #[error("threshold must be in (0,1]: got {0}")]
    InvalidThreshold(f64),

    // --- Not found ---
    #[error("fact not found: {0}")]
    FactNotFound(i64),

    #[error("memory not found: {0}")]
    MemoryNotFound(i64),

    // --- ANN index ---
    #[error("invalid magic header in HNSW index file")]
    InvalidMagic,

    #[error("unsupported HNSW index file version: {0}")]
    UnsupportedVersion(u32),

    // --- Tier 3: transient/storage ---
    #[error("storage error: {0}")]
    Storage(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("busy/locked: retry budget exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl CortexError {
    /// True for the expected-conflict tier: callers skip, not fail.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CortexError::EdgeExists { .. } | CortexError::DuplicateHash { .. })
    }

    /// True when the underlying sqlite error is a transient busy/locked condition.
    pub fn is_transient(&self) -> bool {
        match self {
            CortexError::Sqlite(e) => is_busy_or_locked(e),
            CortexError::RetryExhausted { .. } => true,
            _ => false,
        }
    }
}

pub fn is_busy_or_locked(err: &rusqlite::Error) -> bool {
    use rusqlite::ErrorCode;
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        }
        _ => false,
    }
}

pub fn storage_err(reason: impl Into<String>) -> CortexError {
    CortexError::Storage(reason.into())
}
