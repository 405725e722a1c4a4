//! v003: FTS5 virtual table over content/source_file/source_section, kept
//! in sync with `memories` via insert/delete/update triggers. Triggers
//! suppress soft-deleted rows so FTS hits always resolve to a live memory.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch(
        "
        CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
            content,
            source_file,
            source_section,
            content='memories',
            content_rowid='id',
            tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS memories_fts_insert AFTER INSERT ON memories
        WHEN new.deleted_at IS NULL BEGIN
            INSERT INTO memories_fts(rowid, content, source_file, source_section)
            VALUES (new.id, new.content, new.source_file, new.source_section);
        END;

        CREATE TRIGGER IF NOT EXISTS memories_fts_delete BEFORE DELETE ON memories BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, content, source_file, source_section)
            VALUES ('delete', old.id, old.content, old.source_file, old.source_section);
        END;

        CREATE TRIGGER IF NOT EXISTS memories_fts_soft_delete AFTER UPDATE ON memories
        WHEN old.deleted_at IS NULL AND new.deleted_at IS NOT NULL BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, content, source_file, source_section)
            VALUES ('delete', old.id, old.content, old.source_file, old.source_section);
        END;

        CREATE TRIGGER IF NOT EXISTS memories_fts_update AFTER UPDATE ON memories
        WHEN new.deleted_at IS NULL AND old.deleted_at IS NULL BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, content, source_file, source_section)
            VALUES ('delete', old.id, old.content, old.source_file, old.source_section);
            INSERT INTO memories_fts(rowid, content, source_file, source_section)
            VALUES (new.id, new.content, new.source_file, new.source_section);
        END;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
