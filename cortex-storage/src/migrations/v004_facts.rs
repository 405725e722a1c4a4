//! v004: `facts` and the append-only `fact_access` log.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS facts (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            memory_id        INTEGER NOT NULL,
            subject          TEXT NOT NULL,
            predicate        TEXT NOT NULL,
            object           TEXT NOT NULL,
            fact_type        TEXT NOT NULL,
            confidence       REAL NOT NULL DEFAULT 1.0,
            decay_rate       REAL NOT NULL DEFAULT 0.01,
            last_reinforced  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            source_quote     TEXT,
            created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            superseded_by    INTEGER,
            state            TEXT NOT NULL DEFAULT 'active',
            agent_id         TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE,
            FOREIGN KEY (superseded_by) REFERENCES facts(id)
        );

        CREATE INDEX IF NOT EXISTS idx_facts_memory ON facts(memory_id);
        CREATE INDEX IF NOT EXISTS idx_facts_subject_predicate ON facts(subject, predicate);
        CREATE INDEX IF NOT EXISTS idx_facts_state ON facts(state);
        CREATE INDEX IF NOT EXISTS idx_facts_fact_type ON facts(fact_type);
        CREATE INDEX IF NOT EXISTS idx_facts_agent ON facts(agent_id);

        CREATE TABLE IF NOT EXISTS fact_access (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            fact_id     INTEGER NOT NULL,
            agent_id    TEXT NOT NULL DEFAULT '',
            access_type TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            FOREIGN KEY (fact_id) REFERENCES facts(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_fact_access_fact ON fact_access(fact_id);
        CREATE INDEX IF NOT EXISTS idx_fact_access_agent_window ON fact_access(fact_id, agent_id, created_at);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
