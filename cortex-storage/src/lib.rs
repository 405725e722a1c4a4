//! SQLite persistence layer: connection pool, PRAGMA tuning, idempotent
//! migrations, and the FTS5 full-text index.
//!
//! Every other `cortex-*` repository crate builds its queries directly
//! against the [`ConnectionPool`] this crate exposes; none of them own a
//! SQLite connection themselves.

pub mod migrations;
pub mod pool;
pub mod recovery;

use std::path::Path;
use std::sync::Arc;

use cortex_core::errors::{CortexError, CortexResult};

pub use pool::{ConnectionPool, ReadPool, WriteConnection};

/// Wrap a rusqlite error (or any string cause) as a storage-tier [`CortexError`].
pub fn to_storage_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

/// Opens the database, applies pragmas, and runs all pending migrations.
///
/// This is the entry point every binary/host process calls once at startup;
/// repository crates (`cortex-memory`, `cortex-facts`, ...) receive the
/// already-open [`ConnectionPool`] via [`Self::pool_arc`].
pub struct StorageEngine {
    pool: Arc<ConnectionPool>,
}

impl StorageEngine {
    /// Open (creating if absent) the database at `path`, run migrations, and
    /// return a ready engine. `read_pool_size` sizes the reader pool.
    pub fn open(path: &Path, read_pool_size: usize) -> CortexResult<Self> {
        let pool = ConnectionPool::open(path, read_pool_size)?;
        pool.writer
            .with_conn_sync(|conn| migrations::run_all(conn))?;
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Open `path` without applying pragmas or running migrations. Intended
    /// for read-only hosts attaching to a database another process owns and
    /// migrates.
    pub fn open_read_only(path: &Path, read_pool_size: usize) -> CortexResult<Self> {
        let pool = ConnectionPool::open_read_only(path, read_pool_size)?;
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Open an in-memory database with migrations applied. Writer and
    /// readers see separate databases, so this is only useful for
    /// writer-only unit tests.
    pub fn open_in_memory() -> CortexResult<Self> {
        let pool = ConnectionPool::open_in_memory(0)?;
        pool.writer
            .with_conn_sync(|conn| migrations::run_all(conn))?;
        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Clone the handle to this engine's pool for sharing with a repository.
    pub fn pool_arc(&self) -> Arc<ConnectionPool> {
        Arc::clone(&self.pool)
    }
}
