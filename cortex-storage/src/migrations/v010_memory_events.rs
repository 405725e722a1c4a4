//! v010: `memory_events` — the append-only differential change log.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS memory_events (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            memory_id   INTEGER,
            fact_id     INTEGER,
            event_type  TEXT NOT NULL,
            old_value   TEXT,
            new_value   TEXT,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE,
            FOREIGN KEY (fact_id) REFERENCES facts(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_memory_events_memory ON memory_events(memory_id);
        CREATE INDEX IF NOT EXISTS idx_memory_events_fact ON memory_events(fact_id);
        CREATE INDEX IF NOT EXISTS idx_memory_events_created_at ON memory_events(created_at);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
