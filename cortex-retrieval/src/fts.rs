//! BM25 full-text search over `memories_fts`, with an OR-token retry and a
//! CJK / non-tokenizable `LIKE` fallback.

use std::sync::Arc;

use rusqlite::params;

use cortex_core::config::RetrievalConfig;
use cortex_core::errors::{CortexError, CortexResult};
use cortex_storage::ConnectionPool;

use crate::metadata_filter::MetadataFilters;
use crate::snippet::rune_safe_snippet;

fn to_repo_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

/// Fallback relevance score assigned to `LIKE`-matched results, below any
/// BM25 rank.
pub const FALLBACK_SCORE: f64 = -0.5;

#[derive(Debug, Clone)]
pub struct FtsHit {
    pub memory_id: i64,
    pub score: f64,
    pub snippet: String,
}

/// Runs the hybrid FTS search described for `search_fts`: BM25, then an
/// OR-joined retry, then a rune-safe `LIKE` fallback.
pub fn search_fts(pool: &Arc<ConnectionPool>, query: &str, k: usize, filters: &MetadataFilters) -> CortexResult<Vec<FtsHit>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let hits = run_bm25(pool, query, k, filters)?;
    if !hits.is_empty() {
        return Ok(hits);
    }

    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.len() >= 2 {
        let or_query = tokens.join(" OR ");
        let hits = run_bm25(pool, &or_query, k, filters)?;
        if !hits.is_empty() {
            return Ok(hits);
        }
    }

    run_like_fallback(pool, query, k, filters)
}

fn run_bm25(pool: &Arc<ConnectionPool>, match_query: &str, k: usize, filters: &MetadataFilters) -> CortexResult<Vec<FtsHit>> {
    pool.readers.with_conn(|conn| {
        let mut sql = String::from(
            "SELECT m.id, m.content, rank,
                    snippet(memories_fts, 0, '', '', '...', 10) AS snip
             FROM memories_fts
             JOIN memories m ON m.id = memories_fts.rowid
             WHERE memories_fts MATCH ?1 AND m.deleted_at IS NULL",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(match_query.to_string())];
        filters.apply("m", &mut sql, &mut args);
        sql.push_str(&format!(" ORDER BY rank LIMIT ?{}", args.len() + 1));
        args.push(Box::new(k as i64));

        let mut stmt = conn.prepare(&sql).map_err(|e| to_repo_err(e.to_string()))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let memory_id: i64 = row.get(0)?;
                let rank: f64 = row.get(2)?;
                let snip: String = row.get(3)?;
                Ok(FtsHit {
                    memory_id,
                    score: rank,
                    snippet: snip,
                })
            })
            .map_err(|e| to_repo_err(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| to_repo_err(e.to_string()))
    })
}

fn run_like_fallback(pool: &Arc<ConnectionPool>, query: &str, k: usize, filters: &MetadataFilters) -> CortexResult<Vec<FtsHit>> {
    let radius = RetrievalConfig::default().fallback_snippet_radius;
    pool.readers.with_conn(|conn| {
        let mut sql = String::from(
            "SELECT m.id, m.content FROM memories m
             WHERE m.deleted_at IS NULL AND m.content LIKE ?1 ESCAPE '\\'",
        );
        let like_pattern = format!("%{}%", escape_like(query));
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(like_pattern)];
        filters.apply("m", &mut sql, &mut args);
        sql.push_str(&format!(" LIMIT ?{}", args.len() + 1));
        args.push(Box::new(k as i64));

        let mut stmt = conn.prepare(&sql).map_err(|e| to_repo_err(e.to_string()))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let memory_id: i64 = row.get(0)?;
                let content: String = row.get(1)?;
                Ok((memory_id, content))
            })
            .map_err(|e| to_repo_err(e.to_string()))?;

        let mut hits = Vec::new();
        for row in rows {
            let (memory_id, content) = row.map_err(|e| to_repo_err(e.to_string()))?;
            hits.push(FtsHit {
                memory_id,
                score: FALLBACK_SCORE,
                snippet: rune_safe_snippet(&content, query, radius),
            });
        }
        Ok(hits)
    })
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
