//! v002: the `memories` table — one row per imported text unit.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS memories (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            content         TEXT NOT NULL,
            source_file     TEXT NOT NULL DEFAULT '',
            source_line     INTEGER,
            source_section  TEXT,
            content_hash    TEXT NOT NULL,
            project         TEXT NOT NULL DEFAULT '',
            memory_class    TEXT NOT NULL DEFAULT '',
            metadata        TEXT,
            imported_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            deleted_at      TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_memories_hash_live
            ON memories(content_hash) WHERE deleted_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_memories_project ON memories(project);
        CREATE INDEX IF NOT EXISTS idx_memories_class ON memories(memory_class);
        CREATE INDEX IF NOT EXISTS idx_memories_imported_at ON memories(imported_at);
        CREATE INDEX IF NOT EXISTS idx_memories_source_file ON memories(source_file);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
