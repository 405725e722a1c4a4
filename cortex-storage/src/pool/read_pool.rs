//! Pool of read-only connections. Readers never block the writer and never
//! block each other except on the underlying filesystem.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use super::pragmas::apply_read_pragmas;
use crate::to_storage_err;

/// A small round-robin pool of read-only connections.
pub struct ReadPool {
    conns: Vec<Mutex<Connection>>,
}

impl ReadPool {
    pub fn open(path: &Path, size: usize) -> CortexResult<Self> {
        let size = size.max(1);
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_URI,
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
            apply_read_pragmas(&conn)?;
            conns.push(Mutex::new(conn));
        }
        Ok(Self { conns })
    }

    pub fn open_in_memory(size: usize) -> CortexResult<Self> {
        let size = size.max(1);
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
            conns.push(Mutex::new(conn));
        }
        Ok(Self { conns })
    }

    /// Borrow an arbitrary idle connection and run a closure against it.
    /// Picks the first connection whose mutex isn't currently held; falls
    /// back to blocking on the first one if every connection is busy.
    pub fn with_conn<F, T>(&self, f: F) -> CortexResult<T>
    where
        F: FnOnce(&Connection) -> CortexResult<T>,
    {
        for slot in &self.conns {
            if let Ok(guard) = slot.try_lock() {
                return f(&guard);
            }
        }
        let guard = self.conns[0].lock().map_err(|_| to_storage_err("read pool mutex poisoned"))?;
        f(&guard)
    }

    pub fn size(&self) -> usize {
        self.conns.len()
    }
}
