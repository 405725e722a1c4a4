//! PRAGMA configuration applied to every SQLite connection.
//!
//! WAL mode, NORMAL sync, 256MB mmap, 64MB cache, 30s busy_timeout,
//! foreign_keys ON.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;
use cortex_core::config::defaults::DEFAULT_BUSY_TIMEOUT_MS;

use crate::to_storage_err;

/// Apply all performance and safety pragmas to a writer connection.
pub fn apply_write_pragmas(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA mmap_size = 268435456;
        PRAGMA cache_size = -64000;
        PRAGMA busy_timeout = {DEFAULT_BUSY_TIMEOUT_MS};
        PRAGMA foreign_keys = ON;
        "
    ))
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Apply read-only pragmas to a read connection. Skips write-side settings
/// (journal_mode, synchronous) since the writer already owns them.
pub fn apply_read_pragmas(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA query_only = ON;
        PRAGMA mmap_size = 268435456;
        PRAGMA cache_size = -64000;
        PRAGMA busy_timeout = {DEFAULT_BUSY_TIMEOUT_MS};
        PRAGMA foreign_keys = ON;
        PRAGMA temp_store = MEMORY;
        "
    ))
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Verify that WAL mode is active on a connection.
pub fn verify_wal_mode(conn: &Connection) -> CortexResult<bool> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}
