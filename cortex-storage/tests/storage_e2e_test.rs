//! End-to-end tests against a real file-backed database: a file-backed pool
//! is the only way to exercise writer/reader visibility, since in-memory
//! writer and reader connections point at separate databases.

use cortex_storage::StorageEngine;
use tempfile::tempdir;

#[test]
fn migrations_apply_cleanly_to_a_fresh_file() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cortex.db");
    let engine = StorageEngine::open(&db_path, 2).unwrap();

    let tables: Vec<String> = engine
        .pool()
        .writer
        .with_conn_sync(|conn| {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .unwrap();
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            Ok(rows)
        })
        .unwrap();

    assert!(tables.contains(&"memories".to_string()));
    assert!(tables.contains(&"facts".to_string()));
}

#[test]
fn reopening_an_existing_database_is_idempotent() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cortex.db");
    StorageEngine::open(&db_path, 1).unwrap();
    // Second process/open against the same file must not fail or duplicate schema.
    StorageEngine::open(&db_path, 1).unwrap();
}

#[test]
fn writer_changes_are_visible_to_readers() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cortex.db");
    let engine = StorageEngine::open(&db_path, 1).unwrap();

    engine
        .pool()
        .writer
        .with_conn_sync(|conn| {
            conn.execute(
                "INSERT INTO memories(content, source_file, content_hash) VALUES (?1, ?2, ?3)",
                rusqlite::params!["hello world", "notes.md", "deadbeef"],
            )
            .unwrap();
            Ok(())
        })
        .unwrap();

    let count: i64 = engine
        .pool()
        .readers
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0)).unwrap()))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn fts5_index_stays_in_sync_with_memories() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cortex.db");
    let engine = StorageEngine::open(&db_path, 1).unwrap();

    engine
        .pool()
        .writer
        .with_conn_sync(|conn| {
            conn.execute(
                "INSERT INTO memories(content, source_file, content_hash) VALUES (?1, ?2, ?3)",
                rusqlite::params!["the quick brown fox", "notes.md", "abc123"],
            )
            .unwrap();
            Ok(())
        })
        .unwrap();

    let matched: i64 = engine
        .pool()
        .writer
        .with_conn_sync(|conn| {
            Ok(conn
                .query_row(
                    "SELECT COUNT(*) FROM memories_fts WHERE memories_fts MATCH 'fox'",
                    [],
                    |row| row.get(0),
                )
                .unwrap())
        })
        .unwrap();
    assert_eq!(matched, 1);

    engine
        .pool()
        .writer
        .with_conn_sync(|conn| {
            conn.execute("UPDATE memories SET deleted_at = '2026-01-01T00:00:00Z' WHERE id = 1", [])
                .unwrap();
            Ok(())
        })
        .unwrap();

    let matched_after_delete: i64 = engine
        .pool()
        .writer
        .with_conn_sync(|conn| {
            Ok(conn
                .query_row(
                    "SELECT COUNT(*) FROM memories_fts WHERE memories_fts MATCH 'fox'",
                    [],
                    |row| row.get(0),
                )
                .unwrap())
        })
        .unwrap();
    assert_eq!(matched_after_delete, 0);
}

#[test]
fn wal_mode_is_active_on_a_file_backed_writer() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cortex.db");
    let engine = StorageEngine::open(&db_path, 1).unwrap();

    let in_wal = engine
        .pool()
        .writer
        .with_conn_sync(cortex_storage::pool::pragmas::verify_wal_mode)
        .unwrap();
    assert!(in_wal);
}

#[test]
fn read_only_mode_skips_migrations() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cortex.db");
    // Nothing has migrated this path yet.
    let result = StorageEngine::open_read_only(&db_path, 1);
    // sqlite refuses to open a nonexistent file read-only.
    assert!(result.is_err());

    StorageEngine::open(&db_path, 1).unwrap();
    let engine = StorageEngine::open_read_only(&db_path, 1).unwrap();
    let count: i64 = engine
        .pool()
        .readers
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0)).unwrap()))
        .unwrap();
    assert_eq!(count, 0);
}
