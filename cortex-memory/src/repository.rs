use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use cortex_core::config::defaults::DEFAULT_BATCH_SIZE;
use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::hash::content_hash;
use cortex_core::model::{Memory, MemoryClass};
use cortex_storage::ConnectionPool;

use crate::list_options::ListMemoriesOptions;
use crate::row::memory_from_row;

fn to_repo_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

/// A memory not yet persisted. `content_hash` is computed by the repository
/// when left `None`.
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub content: String,
    pub source_file: String,
    pub source_line: Option<i64>,
    pub source_section: Option<String>,
    pub project: String,
    pub memory_class: String,
    pub metadata: Option<String>,
    pub content_hash: Option<String>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_file: source_file.into(),
            ..Default::default()
        }
    }

    fn resolved_hash(&self) -> String {
        self.content_hash
            .clone()
            .unwrap_or_else(|| content_hash(&self.source_file, &self.content))
    }
}

/// CRUD + batch insert + content-hash dedup for imported text units.
pub struct MemoryRepository {
    pool: Arc<ConnectionPool>,
}

impl MemoryRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Insert a new memory. Fails with `EmptyContent` on empty content and
    /// `DuplicateHash` if a live memory already has the same hash.
    pub fn add(&self, memory: NewMemory) -> CortexResult<i64> {
        if memory.content.trim().is_empty() {
            return Err(CortexError::EmptyContent);
        }
        let memory_class = MemoryClass::normalize_and_validate(&memory.memory_class)?;
        let hash = memory.resolved_hash();

        self.pool.writer.with_conn_sync(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO memories
                    (content, source_file, source_line, source_section, content_hash,
                     project, memory_class, metadata, imported_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    memory.content,
                    memory.source_file,
                    memory.source_line,
                    memory.source_section,
                    hash,
                    memory.project,
                    memory_class,
                    memory.metadata,
                    now,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CortexError::DuplicateHash { hash: hash.clone() }
                } else {
                    to_repo_err(e.to_string())
                }
            })?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Insert memories in chunks of the configured batch size, each chunk in
    /// its own transaction. Missing hashes are computed before insertion.
    pub fn add_batch(&self, memories: Vec<NewMemory>) -> CortexResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(memories.len());
        for chunk in memories.chunks(DEFAULT_BATCH_SIZE) {
            let chunk_ids = self.pool.writer.with_conn_sync(|conn| {
                let tx = conn
                    .unchecked_transaction()
                    .map_err(|e| to_repo_err(e.to_string()))?;
                let mut chunk_ids = Vec::with_capacity(chunk.len());
                for memory in chunk {
                    if memory.content.trim().is_empty() {
                        return Err(CortexError::EmptyContent);
                    }
                    let memory_class = MemoryClass::normalize_and_validate(&memory.memory_class)?;
                    let hash = memory.resolved_hash();
                    let now = Utc::now();
                    tx.execute(
                        "INSERT INTO memories
                            (content, source_file, source_line, source_section, content_hash,
                             project, memory_class, metadata, imported_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                        params![
                            memory.content,
                            memory.source_file,
                            memory.source_line,
                            memory.source_section,
                            hash,
                            memory.project,
                            memory_class,
                            memory.metadata,
                            now,
                        ],
                    )
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            CortexError::DuplicateHash { hash: hash.clone() }
                        } else {
                            to_repo_err(e.to_string())
                        }
                    })?;
                    chunk_ids.push(tx.last_insert_rowid());
                }
                tx.commit().map_err(|e| to_repo_err(e.to_string()))?;
                Ok(chunk_ids)
            })?;
            ids.extend(chunk_ids);
        }
        Ok(ids)
    }

    /// Fetch a memory by id, including soft-deleted rows (audit callers'
    /// responsibility to check `is_deleted`). `None` for a missing id.
    pub fn get(&self, id: i64) -> CortexResult<Option<Memory>> {
        self.pool.readers.with_conn(|conn| {
            conn.query_row("SELECT * FROM memories WHERE id = ?1", params![id], memory_from_row)
                .optional()
                .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Look up a live memory by content hash, for ingestion-time dedup.
    pub fn find_by_hash(&self, hash: &str) -> CortexResult<Option<Memory>> {
        self.pool.readers.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM memories WHERE content_hash = ?1 AND deleted_at IS NULL",
                params![hash],
                memory_from_row,
            )
            .optional()
            .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Paginated listing, ordered by `imported_at` descending by default.
    /// Always excludes soft-deleted memories.
    pub fn list(&self, opts: &ListMemoriesOptions) -> CortexResult<Vec<Memory>> {
        self.pool.readers.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM memories WHERE deleted_at IS NULL");
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(source_file) = &opts.source_file {
                sql.push_str(&format!(" AND source_file = ?{}", args.len() + 1));
                args.push(Box::new(source_file.clone()));
            }
            if let Some(project) = &opts.project {
                sql.push_str(&format!(" AND project = ?{}", args.len() + 1));
                args.push(Box::new(project.clone()));
            }
            if let Some(agent_id) = &opts.agent_id {
                sql.push_str(&format!(
                    " AND json_extract(metadata, '$.agent_id') = ?{}",
                    args.len() + 1
                ));
                args.push(Box::new(agent_id.clone()));
            }
            if let Some(channel) = &opts.channel {
                sql.push_str(&format!(
                    " AND json_extract(metadata, '$.channel') = ?{}",
                    args.len() + 1
                ));
                args.push(Box::new(channel.clone()));
            }
            if let Some(after) = &opts.after {
                sql.push_str(&format!(" AND imported_at >= ?{}", args.len() + 1));
                args.push(Box::new(*after));
            }
            if let Some(before) = &opts.before {
                let exclusive = *before + chrono::Duration::days(1);
                sql.push_str(&format!(" AND imported_at < ?{}", args.len() + 1));
                args.push(Box::new(exclusive));
            }
            if let Some(classes) = &opts.memory_classes {
                if classes.is_empty() {
                    return Ok(Vec::new());
                }
                let start = args.len() + 1;
                let placeholders: Vec<String> =
                    (0..classes.len()).map(|i| format!("?{}", start + i)).collect();
                for class in classes {
                    args.push(Box::new(class.clone()));
                }
                sql.push_str(&format!(" AND memory_class IN ({})", placeholders.join(",")));
            }

            sql.push_str(&format!(
                " ORDER BY imported_at DESC LIMIT ?{} OFFSET ?{}",
                args.len() + 1,
                args.len() + 2
            ));
            args.push(Box::new(opts.limit as i64));
            args.push(Box::new(opts.offset as i64));

            let mut stmt = conn.prepare(&sql).map_err(|e| to_repo_err(e.to_string()))?;
            let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
            let rows = stmt
                .query_map(param_refs.as_slice(), memory_from_row)
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Soft-delete a memory. Fails if it is already deleted. The FTS sync
    /// trigger purges it from `memories_fts` as part of the same statement.
    pub fn delete(&self, id: i64) -> CortexResult<()> {
        self.pool.writer.with_conn_sync(|conn| {
            let now = Utc::now();
            let changed = conn
                .execute(
                    "UPDATE memories SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                    params![id, now],
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            if changed == 0 {
                return Err(CortexError::MemoryNotFound(id));
            }
            Ok(())
        })
    }

    /// Update a memory's content, recomputing its hash. Fails if the memory
    /// is deleted or missing.
    pub fn update(&self, id: i64, content: &str) -> CortexResult<()> {
        if content.trim().is_empty() {
            return Err(CortexError::EmptyContent);
        }
        self.pool.writer.with_conn_sync(|conn| {
            let source_file: String = conn
                .query_row(
                    "SELECT source_file FROM memories WHERE id = ?1 AND deleted_at IS NULL",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| to_repo_err(e.to_string()))?
                .ok_or(CortexError::MemoryNotFound(id))?;

            let hash = content_hash(&source_file, content);
            let now = Utc::now();
            conn.execute(
                "UPDATE memories SET content = ?2, content_hash = ?3, updated_at = ?4
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![id, content, hash, now],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CortexError::DuplicateHash { hash: hash.clone() }
                } else {
                    to_repo_err(e.to_string())
                }
            })?;
            Ok(())
        })
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_storage::StorageEngine;

    fn repo() -> MemoryRepository {
        let engine = StorageEngine::open_in_memory().unwrap();
        MemoryRepository::new(engine.pool_arc())
    }

    #[test]
    fn rejects_empty_content() {
        let repo = repo();
        let result = repo.add(NewMemory::new("   ", "notes.md"));
        assert!(matches!(result, Err(CortexError::EmptyContent)));
    }

    #[test]
    fn add_then_get_round_trips() {
        let repo = repo();
        let id = repo.add(NewMemory::new("hello world", "notes.md")).unwrap();
        let memory = repo.get(id).unwrap().unwrap();
        assert_eq!(memory.content, "hello world");
        assert!(!memory.content_hash.is_empty());
    }

    #[test]
    fn duplicate_hash_is_rejected() {
        let repo = repo();
        repo.add(NewMemory::new("same content", "a.md")).unwrap();
        let result = repo.add(NewMemory::new("same content", "a.md"));
        assert!(matches!(result, Err(CortexError::DuplicateHash { .. })));
    }

    #[test]
    fn same_content_different_source_does_not_collide() {
        let repo = repo();
        repo.add(NewMemory::new("same content", "a.md")).unwrap();
        let id = repo.add(NewMemory::new("same content", "b.md")).unwrap();
        assert!(repo.get(id).unwrap().is_some());
    }

    #[test]
    fn delete_is_not_repeatable() {
        let repo = repo();
        let id = repo.add(NewMemory::new("hello", "a.md")).unwrap();
        repo.delete(id).unwrap();
        let result = repo.delete(id);
        assert!(matches!(result, Err(CortexError::MemoryNotFound(_))));
    }

    #[test]
    fn list_excludes_deleted_by_default() {
        let repo = repo();
        let id = repo.add(NewMemory::new("hello", "a.md")).unwrap();
        repo.delete(id).unwrap();
        let listed = repo.list(&ListMemoriesOptions::new()).unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn list_filters_by_project() {
        let repo = repo();
        let mut wanted = NewMemory::new("in project", "a.md");
        wanted.project = "acme".to_string();
        repo.add(wanted).unwrap();
        repo.add(NewMemory::new("untagged", "b.md")).unwrap();

        let opts = ListMemoriesOptions {
            project: Some("acme".to_string()),
            ..ListMemoriesOptions::new()
        };
        let listed = repo.list(&opts).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "in project");
    }

    #[test]
    fn update_recomputes_hash_and_bumps_updated_at() {
        let repo = repo();
        let id = repo.add(NewMemory::new("v1", "a.md")).unwrap();
        let before = repo.get(id).unwrap().unwrap();
        repo.update(id, "v2").unwrap();
        let after = repo.get(id).unwrap().unwrap();
        assert_eq!(after.content, "v2");
        assert_ne!(after.content_hash, before.content_hash);
    }

    #[test]
    fn add_batch_chunks_and_inserts_all() {
        let repo = repo();
        let memories: Vec<NewMemory> = (0..5)
            .map(|i| NewMemory::new(format!("memory {i}"), "bulk.md"))
            .collect();
        let ids = repo.add_batch(memories).unwrap();
        assert_eq!(ids.len(), 5);
    }
}
