//! v007: `fact_edges` (typed, directed) and `cooccurrence` (canonical,
//! undirected) over facts.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS fact_edges (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            source_fact_id   INTEGER NOT NULL,
            target_fact_id   INTEGER NOT NULL,
            edge_type        TEXT NOT NULL,
            confidence       REAL NOT NULL DEFAULT 1.0,
            source           TEXT NOT NULL DEFAULT 'detected',
            agent_id         TEXT,
            created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            UNIQUE (source_fact_id, target_fact_id, edge_type),
            FOREIGN KEY (source_fact_id) REFERENCES facts(id) ON DELETE CASCADE,
            FOREIGN KEY (target_fact_id) REFERENCES facts(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_fact_edges_source ON fact_edges(source_fact_id);
        CREATE INDEX IF NOT EXISTS idx_fact_edges_target ON fact_edges(target_fact_id);
        CREATE INDEX IF NOT EXISTS idx_fact_edges_type ON fact_edges(edge_type);

        CREATE TABLE IF NOT EXISTS cooccurrence (
            fact_a      INTEGER NOT NULL,
            fact_b      INTEGER NOT NULL,
            count       INTEGER NOT NULL DEFAULT 1,
            last_seen   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (fact_a, fact_b),
            CHECK (fact_a < fact_b),
            FOREIGN KEY (fact_a) REFERENCES facts(id) ON DELETE CASCADE,
            FOREIGN KEY (fact_b) REFERENCES facts(id) ON DELETE CASCADE
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
