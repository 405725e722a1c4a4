// Single source of truth for all default values, organized by component.

// --- Storage ---
pub const DEFAULT_DB_FILENAME: &str = "cortex.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 30_000;
pub const DEFAULT_RETRY_INITIAL_BACKOFF_MS: u64 = 100;
pub const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 2_000;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 8;
pub const DEFAULT_MIGRATION_CLAIM_POLL_SECS: u64 = 30;

// --- Memory / Fact repositories ---
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const DEFAULT_CONFIDENCE: f64 = 1.0;
pub const DEFAULT_DECAY_RATE: f64 = 0.01;

// --- Fact dedup ---
pub const DEFAULT_DEDUP_SIMILARITY_THRESHOLD: f64 = 0.90;
pub const DEFAULT_DEDUP_MAX_PREVIEW: usize = 100;

// --- HNSW ANN index ---
pub const DEFAULT_HNSW_M: usize = 16;
pub const DEFAULT_HNSW_MIN_M: usize = 2;
pub const DEFAULT_HNSW_EF_CONSTRUCTION: usize = 200;
pub const DEFAULT_HNSW_EF_SEARCH: usize = 50;
pub const HNSW_MAGIC: &[u8; 8] = b"CRTXHNS\x01";
pub const HNSW_FORMAT_VERSION: u32 = 1;

// --- Graph engine ---
pub const DEFAULT_MIN_COOCCURRENCE_COUNT: i64 = 5;
pub const DEFAULT_INFERENCE_MIN_CONFIDENCE: f64 = 0.3;
pub const DEFAULT_INFERENCE_MAX_EDGES: usize = 100;

// --- Cluster engine ---
pub const DEFAULT_NEW_SUBJECT_REBUILD_RATIO: f64 = 0.10;

// --- Alert & watch engine ---
pub const DEFAULT_DECAY_CRITICAL_THRESHOLD: f64 = 0.30;
pub const DEFAULT_DECAY_WARNING_THRESHOLD: f64 = 0.50;
pub const DEFAULT_CROSS_AGENT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_CONFLICT_LIMIT: usize = 20;

// --- Project/class tagger ---
pub const DEFAULT_CONTENT_RULE_MIN_HITS: usize = 2;

// --- Webhook notifier ---
pub const DEFAULT_WEBHOOK_BATCH_WINDOW_SECS: u64 = 5;
pub const DEFAULT_WEBHOOK_RETRY_DELAY_SECS: u64 = 5;
pub const CORTEX_VERSION: &str = env!("CARGO_PKG_VERSION");
