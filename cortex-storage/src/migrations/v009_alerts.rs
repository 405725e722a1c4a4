//! v009: `alerts` and persistent `watch_queries`.

use rusqlite::Connection;

use cortex_core::errors::CortexResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> CortexResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS alerts (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            alert_type      TEXT NOT NULL,
            severity        TEXT NOT NULL,
            fact_id         INTEGER,
            related_fact_id INTEGER,
            agent_id        TEXT NOT NULL DEFAULT '',
            message         TEXT NOT NULL,
            detail          TEXT NOT NULL DEFAULT '{}',
            acknowledged    INTEGER NOT NULL DEFAULT 0,
            acknowledged_at TEXT,
            created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            FOREIGN KEY (fact_id) REFERENCES facts(id) ON DELETE CASCADE,
            FOREIGN KEY (related_fact_id) REFERENCES facts(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_alerts_fact ON alerts(fact_id);
        CREATE INDEX IF NOT EXISTS idx_alerts_agent ON alerts(agent_id);
        CREATE INDEX IF NOT EXISTS idx_alerts_unacked ON alerts(acknowledged) WHERE acknowledged = 0;

        CREATE TABLE IF NOT EXISTS watch_queries (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            query             TEXT NOT NULL,
            threshold         REAL NOT NULL DEFAULT 0.5,
            delivery_channel  TEXT NOT NULL DEFAULT 'alert',
            webhook_url       TEXT,
            agent_id          TEXT NOT NULL DEFAULT '',
            active            INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            last_matched_at   TEXT,
            match_count       INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_watch_queries_active ON watch_queries(active) WHERE active = 1;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
