//! v008: `clusters` and the `fact_clusters` many-to-many assignment.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS clusters (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            canonical_name    TEXT NOT NULL,
            aliases           TEXT NOT NULL DEFAULT '[]',
            cohesion          REAL NOT NULL DEFAULT 0.0,
            fact_count        INTEGER NOT NULL DEFAULT 0,
            average_confidence REAL NOT NULL DEFAULT 0.0,
            palette_color     TEXT,
            top_subjects      TEXT NOT NULL DEFAULT '[]',
            updated_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_clusters_canonical_name ON clusters(canonical_name);

        CREATE TABLE IF NOT EXISTS fact_clusters (
            fact_id    INTEGER NOT NULL,
            cluster_id INTEGER NOT NULL,
            relevance  REAL NOT NULL DEFAULT 1.0,
            PRIMARY KEY (fact_id, cluster_id),
            FOREIGN KEY (fact_id) REFERENCES facts(id) ON DELETE CASCADE,
            FOREIGN KEY (cluster_id) REFERENCES clusters(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_fact_clusters_cluster ON fact_clusters(cluster_id);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
