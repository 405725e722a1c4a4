use chrono::{DateTime, Utc};
use rusqlite::Row;

use cortex_core::model::Memory;

pub fn memory_from_row(row: &Row) -> rusqlite::Result<Memory> {
    Ok(Memory {
        id: row.get("id")?,
        content: row.get("content")?,
        source_file: row.get("source_file")?,
        source_line: row.get("source_line")?,
        source_section: row.get("source_section")?,
        content_hash: row.get("content_hash")?,
        project: row.get("project")?,
        memory_class: row.get("memory_class")?,
        metadata: row.get("metadata")?,
        imported_at: row.get::<_, DateTime<Utc>>("imported_at")?,
        updated_at: row.get::<_, DateTime<Utc>>("updated_at")?,
        deleted_at: row.get::<_, Option<DateTime<Utc>>>("deleted_at")?,
    })
}
