//! Single write connection behind `tokio::sync::Mutex`. Serialized writes —
//! no contention, no writer starvation.

use std::path::Path;

use rusqlite::Connection;
use tokio::sync::Mutex;

use cortex_core::config::defaults::{
    DEFAULT_RETRY_INITIAL_BACKOFF_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_BACKOFF_MS,
};
use cortex_core::errors::CortexResult;

use super::pragmas::apply_write_pragmas;
use super::retry::with_retry;
use crate::to_storage_err;

/// A single write connection protected by an async mutex.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    /// Open a new write connection to the given database path.
    pub fn open(path: &Path) -> CortexResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        apply_write_pragmas(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open `path` read-only: no WAL/synchronous pragmas are applied, since
    /// another process owns the file and its migration state. Used only by
    /// [`crate::StorageEngine::open_read_only`].
    pub fn open_read_only(path: &Path) -> CortexResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> CortexResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        apply_write_pragmas(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the write lock and execute a closure with the connection.
    pub async fn with_conn<F, T>(&self, f: F) -> CortexResult<T>
    where
        F: FnOnce(&Connection) -> CortexResult<T>,
    {
        let guard = self.conn.lock().await;
        f(&guard)
    }

    /// Synchronous access for non-async contexts (migrations at startup,
    /// blocking callers).
    pub fn with_conn_sync<F, T>(&self, f: F) -> CortexResult<T>
    where
        F: FnOnce(&Connection) -> CortexResult<T>,
    {
        let guard = self.conn.blocking_lock();
        f(&guard)
    }

    /// Like [`Self::with_conn_sync`], but retries the whole closure with
    /// exponential backoff if it fails on a busy/locked sqlite error.
    pub fn with_conn_retrying<F, T>(&self, mut f: F) -> CortexResult<T>
    where
        F: FnMut(&Connection) -> Result<T, rusqlite::Error>,
    {
        let guard = self.conn.blocking_lock();
        with_retry(
            DEFAULT_RETRY_INITIAL_BACKOFF_MS,
            DEFAULT_RETRY_MAX_BACKOFF_MS,
            DEFAULT_RETRY_MAX_ATTEMPTS,
            || f(&guard),
        )
    }
}
