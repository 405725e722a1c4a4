//! Connection pool managing the single writer and the read connection pool.

pub mod pragmas;
pub mod read_pool;
mod retry;
pub mod write_connection;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cortex_core::errors::CortexResult;

pub use read_pool::ReadPool;
pub use retry::with_retry;
pub use write_connection::WriteConnection;

/// Owns the single write connection and the read connection pool.
///
/// Both are wrapped in `Arc` so they can be shared across repository structs
/// (`MemoryRepository`, `FactRepository`, ...) without opening duplicate
/// connections to the same file.
pub struct ConnectionPool {
    pub writer: Arc<WriteConnection>,
    pub readers: Arc<ReadPool>,
    pub db_path: Option<PathBuf>,
    pub read_only: bool,
}

impl ConnectionPool {
    /// Open a connection pool for the given database file, with pragmas
    /// applied to every connection and the writer ready for migrations.
    pub fn open(path: &Path, read_pool_size: usize) -> CortexResult<Self> {
        let writer = Arc::new(WriteConnection::open(path)?);
        let readers = Arc::new(ReadPool::open(path, read_pool_size)?);
        Ok(Self {
            writer,
            readers,
            db_path: Some(path.to_path_buf()),
            read_only: false,
        })
    }

    /// Open a connection pool in read-only mode: no WAL/synchronous pragmas,
    /// no writer, migrations are the other process's responsibility.
    pub fn open_read_only(path: &Path, read_pool_size: usize) -> CortexResult<Self> {
        let readers = Arc::new(ReadPool::open(path, read_pool_size)?);
        let writer = Arc::new(WriteConnection::open_read_only(path)?);
        Ok(Self {
            writer,
            readers,
            db_path: Some(path.to_path_buf()),
            read_only: true,
        })
    }

    /// Open an in-memory connection pool (for testing). Writer and readers
    /// use separate in-memory databases, so readers won't see writer
    /// changes — use a temp file for integration tests that need both.
    pub fn open_in_memory(read_pool_size: usize) -> CortexResult<Self> {
        let writer = Arc::new(WriteConnection::open_in_memory()?);
        let readers = Arc::new(ReadPool::open_in_memory(read_pool_size)?);
        Ok(Self {
            writer,
            readers,
            db_path: None,
            read_only: false,
        })
    }
}
