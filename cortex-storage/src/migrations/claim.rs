//! Cross-process migration claims.
//!
//! A migration step that must run at most once across concurrently starting
//! processes claims a `meta` row with a compare-and-insert, does its work,
//! and then marks the row `true`. A process that loses the race either polls
//! for completion or, if the claim owner's pid is dead, steals the claim
//! with a compare-and-delete.

use std::process::Command;
use std::thread::sleep;
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use cortex_core::config::defaults::DEFAULT_MIGRATION_CLAIM_POLL_SECS;
use cortex_core::errors::CortexResult;

use crate::to_storage_err;

const DONE: &str = "true";

fn claim_value() -> String {
    format!("in_progress;pid={};started_at={}", std::process::id(), Utc::now().to_rfc3339())
}

/// Parsed form of an `in_progress;pid=<n>;started_at=<ts>` claim value.
/// `None` fields mean the value didn't match the expected shape.
struct ParsedClaim {
    pid: Option<u32>,
}

fn parse_claim(value: &str) -> Option<ParsedClaim> {
    if !value.starts_with("in_progress;") {
        return None;
    }
    let pid = value
        .split(';')
        .find_map(|part| part.strip_prefix("pid="))
        .and_then(|s| s.parse::<u32>().ok());
    Some(ParsedClaim { pid })
}

/// `kill -0 <pid>` — true if the process still exists and we have
/// permission to signal it (which is all "is it alive" requires).
fn pid_is_alive(pid: u32) -> bool {
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn read_meta(conn: &Connection, key: &str) -> CortexResult<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))
}

fn compare_and_insert(conn: &Connection, key: &str, value: &str) -> CortexResult<bool> {
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if changed == 1 {
        return Ok(true);
    }
    // Someone else's row already exists: confirm it's actually theirs, not a
    // race where our own attempt silently no-op'd against a stale match.
    Ok(read_meta(conn, key)?.as_deref() == Some(value))
}

fn compare_and_delete(conn: &Connection, key: &str, expected: &str) -> CortexResult<bool> {
    let changed = conn
        .execute(
            "DELETE FROM meta WHERE key = ?1 AND value = ?2",
            params![key, expected],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(changed == 1)
}

fn set_done(conn: &Connection, key: &str) -> CortexResult<()> {
    conn.execute(
        "INSERT INTO meta(key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, DONE],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Run `apply` exactly once across all processes sharing this database,
/// gated by the `meta[key]` flag. Returns once the step is durably applied
/// by *some* process (not necessarily this one).
pub fn ensure_applied<F>(conn: &Connection, key: &str, apply: F) -> CortexResult<()>
where
    F: FnOnce(&Connection) -> CortexResult<()>,
{
    if read_meta(conn, key)? == Some(DONE.to_string()) {
        return Ok(());
    }

    let my_claim = claim_value();
    let deadline = Instant::now() + Duration::from_secs(DEFAULT_MIGRATION_CLAIM_POLL_SECS);

    loop {
        if compare_and_insert(conn, key, &my_claim)? {
            // We own the claim: run the step and release it either way.
            return match apply(conn) {
                Ok(()) => set_done(conn, key),
                Err(e) => {
                    let _ = compare_and_delete(conn, key, &my_claim);
                    Err(e)
                }
            };
        }

        if read_meta(conn, key)? == Some(DONE.to_string()) {
            return Ok(());
        }

        let Some(current) = read_meta(conn, key)? else {
            // Claim vanished between our insert attempt and this read; retry.
            continue;
        };

        let stale = match parse_claim(&current) {
            Some(ParsedClaim { pid: Some(pid) }) => !pid_is_alive(pid),
            _ => true, // malformed claim, not even worth trusting
        };

        if stale {
            compare_and_delete(conn, key, &current)?;
            continue;
        }

        if Instant::now() >= deadline {
            return Err(to_storage_err(format!(
                "migration claim '{key}' still held by a live process after {DEFAULT_MIGRATION_CLAIM_POLL_SECS}s"
            )));
        }
        sleep(Duration::from_millis(200));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .unwrap();
        conn
    }

    #[test]
    fn applies_once_and_marks_done() {
        let conn = memory_conn();
        let mut calls = 0;
        ensure_applied(&conn, "widgets_v1", |_| {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(read_meta(&conn, "widgets_v1").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn second_call_is_a_no_op() {
        let conn = memory_conn();
        ensure_applied(&conn, "widgets_v1", |_| Ok(())).unwrap();
        let mut calls = 0;
        ensure_applied(&conn, "widgets_v1", |_| {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn steals_claim_from_a_dead_pid() {
        let conn = memory_conn();
        // A pid that (almost certainly) doesn't exist.
        conn.execute(
            "INSERT INTO meta(key, value) VALUES ('widgets_v1', 'in_progress;pid=999999;started_at=2020-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        ensure_applied(&conn, "widgets_v1", |_| Ok(())).unwrap();
        assert_eq!(read_meta(&conn, "widgets_v1").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn clears_claim_when_apply_fails() {
        let conn = memory_conn();
        let result = ensure_applied(&conn, "widgets_v1", |_| Err(to_storage_err("boom")));
        assert!(result.is_err());
        assert!(read_meta(&conn, "widgets_v1").unwrap().is_none());
    }

    #[test]
    fn steals_a_malformed_claim() {
        let conn = memory_conn();
        conn.execute(
            "INSERT INTO meta(key, value) VALUES ('widgets_v1', 'garbage')",
            [],
        )
        .unwrap();
        ensure_applied(&conn, "widgets_v1", |_| Ok(())).unwrap();
        assert_eq!(read_meta(&conn, "widgets_v1").unwrap().as_deref(), Some("true"));
    }
}
