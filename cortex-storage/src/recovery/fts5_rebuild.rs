//! Rebuild the FTS5 index from the `memories` table contents.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

/// Rebuild `memories_fts` from scratch. Useful after a bulk import that
/// bypassed the sync triggers, or to repair index corruption.
pub fn rebuild_fts5_index(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch("INSERT INTO memories_fts(memories_fts) VALUES('rebuild')")
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
