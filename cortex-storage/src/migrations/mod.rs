//! Ordered, idempotent schema migrations.
//!
//! Each step is guarded either by a `meta` claim ([`claim::ensure_applied`])
//! for steps that must not run concurrently, or by a native idempotence
//! check (`CREATE TABLE IF NOT EXISTS`, `pragma_table_info`) for steps where
//! SQLite already makes re-running safe. `v001` bootstraps the `meta` table
//! itself and so is the one step that runs unconditionally.

mod claim;
mod v001_meta;
mod v002_memories;
mod v003_fts5_index;
mod v004_facts;
mod v005_embeddings;
mod v006_embedding_model_version;
mod v007_graph;
mod v008_clusters;
mod v009_alerts;
mod v010_memory_events;

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use claim::ensure_applied;

const SCHEMA_BOOTSTRAP_COMPLETE: &str = "schema_bootstrap_complete";

/// Apply every migration in order. Safe to call from any number of
/// concurrently starting processes against the same database file.
pub fn run_all(conn: &Connection) -> CortexResult<()> {
    v001_meta::migrate(conn)?;

    ensure_applied(conn, "memories_v1", v002_memories::migrate)?;
    ensure_applied(conn, "fts_multi_column", v003_fts5_index::migrate)?;
    ensure_applied(conn, "facts_v1", v004_facts::migrate)?;
    ensure_applied(conn, "embeddings_v1", v005_embeddings::migrate)?;
    v006_embedding_model_version::migrate(conn)?;
    ensure_applied(conn, "graph_v1", v007_graph::migrate)?;
    ensure_applied(conn, "clusters_v1", v008_clusters::migrate)?;
    ensure_applied(conn, "alerts_v1", v009_alerts::migrate)?;
    ensure_applied(conn, "events_v1", v010_memory_events::migrate)?;

    ensure_applied(conn, SCHEMA_BOOTSTRAP_COMPLETE, |_| Ok(()))
}
