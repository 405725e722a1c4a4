//! v006: add `model_version` to `embeddings`, guarded by a `pragma_table_info`
//! column-existence check rather than a meta claim — `ALTER TABLE ADD COLUMN`
//! is itself idempotent to check for, just not to run twice.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

fn has_column(conn: &Connection, table: &str, column: &str) -> CortexResult<bool> {
    let mut stmt = conn
        .prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")
        .map_err(|e| to_storage_err(e.to_string()))?;
    stmt.exists(rusqlite::params![table, column])
        .map_err(|e| to_storage_err(e.to_string()))
}

pub fn migrate(conn: &Connection) -> CortexResult<()> {
    if !has_column(conn, "embeddings", "model_version")? {
        conn.execute_batch("ALTER TABLE embeddings ADD COLUMN model_version TEXT")
            .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_column_once_and_is_safe_to_rerun() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE embeddings (memory_id INTEGER PRIMARY KEY, vector BLOB, dimensions INTEGER)",
        )
        .unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert!(has_column(&conn, "embeddings", "model_version").unwrap());
    }
}
