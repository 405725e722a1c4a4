//! Per-subsystem configuration structs.
//!
//! Each struct is plain `serde`-derived data with a `Default` seeded from
//! [`defaults`]; no global mutable state.

pub mod defaults;

mod alerts_config;
mod cluster_config;
mod dedup_config;
mod hnsw_config;
mod retrieval_config;
mod storage_config;
mod tagger_config;
mod webhook_config;

pub use alerts_config::AlertsConfig;
pub use cluster_config::ClusterConfig;
pub use dedup_config::DedupConfig;
pub use hnsw_config::HnswConfig;
pub use retrieval_config::RetrievalConfig;
pub use storage_config::StorageConfig;
pub use tagger_config::TaggerConfig;
pub use webhook_config::WebhookConfig;
