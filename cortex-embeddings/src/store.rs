//! Dense-vector persistence keyed by memory id, with a brute-force cosine
//! fallback for corpora too small (or too fresh) to warrant the ANN index.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::model::Embedding;
use cortex_storage::ConnectionPool;

fn to_repo_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

/// Encodes a vector as little-endian 32-bit IEEE-754, 4 bytes per dimension.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decodes a little-endian f32 blob back into a vector. Returns a storage
/// error if the blob length is not a multiple of 4.
pub fn decode_vector(bytes: &[u8]) -> CortexResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(to_repo_err(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Cosine similarity in `[-1, 1]`. Mismatched lengths or a zero-norm vector
/// return `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        norm_a += *x as f64 * *x as f64;
        norm_b += *y as f64 * *y as f64;
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub memory_id: i64,
    pub similarity: f64,
}

pub struct EmbeddingStore {
    pool: Arc<ConnectionPool>,
}

impl EmbeddingStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Upserts by memory id (primary key).
    pub fn add(&self, memory_id: i64, vector: &[f32]) -> CortexResult<()> {
        let blob = encode_vector(vector);
        let dimensions = vector.len() as i64;
        let now = Utc::now();
        self.pool.writer.with_conn_sync(|conn| {
            conn.execute(
                "INSERT INTO embeddings (memory_id, vector, dimensions, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(memory_id) DO UPDATE SET
                     vector = excluded.vector,
                     dimensions = excluded.dimensions,
                     updated_at = excluded.updated_at",
                params![memory_id, blob, dimensions, now],
            )
            .map_err(|e| to_repo_err(e.to_string()))?;
            Ok(())
        })
    }

    pub fn get(&self, memory_id: i64) -> CortexResult<Option<Embedding>> {
        self.pool.readers.with_conn(|conn| {
            conn.query_row(
                "SELECT memory_id, vector, dimensions, model_version, created_at, updated_at
                 FROM embeddings WHERE memory_id = ?1",
                params![memory_id],
                embedding_from_row,
            )
            .optional()
            .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Current dimensionality, read from a single arbitrary row. `None` if
    /// the store is empty.
    pub fn dimensions(&self) -> CortexResult<Option<usize>> {
        self.pool.readers.with_conn(|conn| {
            conn.query_row("SELECT dimensions FROM embeddings LIMIT 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .optional()
            .map(|d| d.map(|d| d as usize))
            .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Memory ids with content but no embedding row yet, for bulk backfill.
    pub fn list_memory_ids_without_embeddings(&self, limit: usize) -> CortexResult<Vec<i64>> {
        self.pool.readers.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT m.id FROM memories m
                     LEFT JOIN embeddings e ON e.memory_id = m.id
                     WHERE e.memory_id IS NULL AND m.deleted_at IS NULL
                     ORDER BY m.id ASC LIMIT ?1",
                )
                .map_err(|e| to_repo_err(e.to_string()))?;
            let rows = stmt
                .query_map(params![limit as i64], |row| row.get(0))
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Bulk-loads embeddings for a set of memory ids without N+1 queries.
    pub fn get_memories_by_ids(&self, ids: &[i64]) -> CortexResult<Vec<Embedding>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.pool.readers.with_conn(|conn| {
            let placeholders = vec!["?"; ids.len()].join(",");
            let sql = format!(
                "SELECT memory_id, vector, dimensions, model_version, created_at, updated_at
                 FROM embeddings WHERE memory_id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql).map_err(|e| to_repo_err(e.to_string()))?;
            let args: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
            let rows = stmt
                .query_map(args.as_slice(), embedding_from_row)
                .map_err(|e| to_repo_err(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| to_repo_err(e.to_string()))
        })
    }

    /// Brute-force cosine similarity search over all live embeddings
    /// (optionally filtered by project), returning the top `k` by
    /// similarity descending, excluding matches below `min_sim`.
    pub fn search(&self, query: &[f32], k: usize, min_sim: f64, project: Option<&str>) -> CortexResult<Vec<VectorMatch>> {
        self.pool.readers.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT e.memory_id, e.vector FROM embeddings e
                 JOIN memories m ON m.id = e.memory_id
                 WHERE m.deleted_at IS NULL",
            );
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            if let Some(project) = project {
                sql.push_str(" AND m.project = ?1");
                args.push(Box::new(project.to_string()));
            }

            let mut stmt = conn.prepare(&sql).map_err(|e| to_repo_err(e.to_string()))?;
            let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
            let rows = stmt
                .query_map(param_refs.as_slice(), |row| {
                    let memory_id: i64 = row.get(0)?;
                    let blob: Vec<u8> = row.get(1)?;
                    Ok((memory_id, blob))
                })
                .map_err(|e| to_repo_err(e.to_string()))?;

            let mut matches: Vec<VectorMatch> = Vec::new();
            for row in rows {
                let (memory_id, blob) = row.map_err(|e| to_repo_err(e.to_string()))?;
                let vector = decode_vector(&blob)?;
                let similarity = cosine_similarity(query, &vector);
                if similarity >= min_sim {
                    matches.push(VectorMatch { memory_id, similarity });
                }
            }

            matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
            matches.truncate(k);
            Ok(matches)
        })
    }
}

fn embedding_from_row(row: &rusqlite::Row) -> rusqlite::Result<Embedding> {
    let blob: Vec<u8> = row.get("vector")?;
    let vector = decode_vector(&blob).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Blob,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
        )
    })?;
    Ok(Embedding {
        memory_id: row.get("memory_id")?,
        vector,
        dimensions: row.get::<_, i64>("dimensions")? as usize,
        model_version: row.get("model_version")?,
        created_at: row.get::<_, DateTime<Utc>>("created_at")?,
        updated_at: row.get::<_, DateTime<Utc>>("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_storage::StorageEngine;

    fn seed_memory(engine: &StorageEngine, project: &str) -> i64 {
        engine
            .pool()
            .writer
            .with_conn_sync(|conn| {
                conn.execute(
                    "INSERT INTO memories (content, source_file, content_hash, project, memory_class, imported_at, updated_at)
                     VALUES ('hi', 'a.md', ?1, ?2, 'note', ?3, ?3)",
                    params![format!("hash-{}", rand_suffix()), project, Utc::now()],
                )
                .unwrap();
                Ok::<_, CortexError>(conn.last_insert_rowid())
            })
            .unwrap()
    }

    // Deterministic per-call suffix without pulling in a `rand` dependency.
    fn rand_suffix() -> i64 {
        use std::sync::atomic::{AtomicI64, Ordering};
        static COUNTER: AtomicI64 = AtomicI64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    #[test]
    fn encode_decode_round_trips() {
        let v = vec![1.0f32, -2.5, 0.0, 3.25];
        let bytes = encode_vector(&v);
        assert_eq!(bytes.len(), 16);
        let decoded = decode_vector(&bytes).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_length_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn add_upserts_and_get_round_trips() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory_id = seed_memory(&engine, "proj");
        let store = EmbeddingStore::new(engine.pool_arc());

        store.add(memory_id, &[1.0, 2.0, 3.0]).unwrap();
        let e = store.get(memory_id).unwrap().unwrap();
        assert_eq!(e.vector, vec![1.0, 2.0, 3.0]);
        assert_eq!(e.dimensions, 3);

        store.add(memory_id, &[9.0, 9.0]).unwrap();
        let e2 = store.get(memory_id).unwrap().unwrap();
        assert_eq!(e2.vector, vec![9.0, 9.0]);
        assert_eq!(e2.dimensions, 2);
    }

    #[test]
    fn list_memory_ids_without_embeddings_excludes_embedded() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let a = seed_memory(&engine, "proj");
        let b = seed_memory(&engine, "proj");
        let store = EmbeddingStore::new(engine.pool_arc());
        store.add(a, &[1.0]).unwrap();

        let missing = store.list_memory_ids_without_embeddings(10).unwrap();
        assert_eq!(missing, vec![b]);
    }

    #[test]
    fn search_returns_top_k_sorted_desc() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let a = seed_memory(&engine, "proj");
        let b = seed_memory(&engine, "proj");
        let c = seed_memory(&engine, "proj");
        let store = EmbeddingStore::new(engine.pool_arc());
        store.add(a, &[1.0, 0.0]).unwrap();
        store.add(b, &[0.9, 0.1]).unwrap();
        store.add(c, &[-1.0, 0.0]).unwrap();

        let results = store.search(&[1.0, 0.0], 2, -1.0, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].memory_id, a);
        assert_eq!(results[1].memory_id, b);
    }

    #[test]
    fn search_filters_by_project() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let a = seed_memory(&engine, "proj-a");
        let b = seed_memory(&engine, "proj-b");
        let store = EmbeddingStore::new(engine.pool_arc());
        store.add(a, &[1.0, 0.0]).unwrap();
        store.add(b, &[1.0, 0.0]).unwrap();

        let results = store.search(&[1.0, 0.0], 10, -1.0, Some("proj-a")).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory_id, a);
    }
}
