//! Online backup/restore via SQLite's incremental backup API. Runs without
//! blocking concurrent readers or the writer for more than a few ms per step.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

/// Copy the live database at `conn` to `backup_path`.
pub fn create_backup(conn: &Connection, backup_path: &Path) -> CortexResult<()> {
    let mut dst = Connection::open(backup_path)
        .map_err(|e| to_storage_err(format!("open backup dest: {e}")))?;

    let backup = rusqlite::backup::Backup::new(conn, &mut dst)
        .map_err(|e| to_storage_err(format!("init backup: {e}")))?;

    backup
        .run_to_completion(100, Duration::from_millis(10), None)
        .map_err(|e| to_storage_err(format!("run backup: {e}")))?;

    Ok(())
}

/// Overwrite `conn` with the contents of the backup file at `backup_path`.
pub fn restore_from_backup(conn: &mut Connection, backup_path: &Path) -> CortexResult<()> {
    let src = Connection::open(backup_path)
        .map_err(|e| to_storage_err(format!("open backup source: {e}")))?;

    let backup = rusqlite::backup::Backup::new(&src, conn)
        .map_err(|e| to_storage_err(format!("init restore: {e}")))?;

    backup
        .run_to_completion(100, Duration::from_millis(10), None)
        .map_err(|e| to_storage_err(format!("run restore: {e}")))?;

    Ok(())
}
