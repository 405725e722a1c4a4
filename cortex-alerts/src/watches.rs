use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use cortex_core::errors::{CortexError, CortexResult};
use cortex_core::model::{Alert, AlertSeverity, AlertType, DeliveryChannel, WatchQuery};
use cortex_storage::ConnectionPool;

use crate::repository::{AlertRepository, NewAlert};
use crate::webhook::{WebhookNotifier, WebhookTransport};

fn to_err(msg: impl Into<String>) -> CortexError {
    CortexError::Storage(msg.into())
}

const SNIPPET_RADIUS: usize = 40;

/// Lightweight BM25-like relevance score for a watch query against a
/// memory's content: `term_coverage · freq_boost + phrase_bonus`, capped at
/// 1.0.
pub fn score_watch(query: &str, content: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let content_lower = content.to_lowercase();

    let terms: Vec<&str> = query_lower.split_whitespace().collect();
    if terms.is_empty() {
        return 0.0;
    }
    let content_words: Vec<&str> = content_lower.split_whitespace().collect();

    let mut matched_terms = 0usize;
    let mut total_occurrences = 0usize;
    for term in &terms {
        let occurrences = content_words.iter().filter(|w| **w == *term).count();
        if occurrences > 0 {
            matched_terms += 1;
            total_occurrences += occurrences;
        }
    }

    let term_coverage = matched_terms as f64 / terms.len() as f64;
    let freq_boost = if total_occurrences > terms.len() {
        (1.0 + 0.1 * (total_occurrences - terms.len()) as f64).min(1.5)
    } else {
        1.0
    };
    let phrase_bonus = if content_lower.contains(query_lower.as_str()) { 0.2 } else { 0.0 };

    (term_coverage * freq_boost + phrase_bonus).min(1.0)
}

fn snippet_around_match(content: &str, query: &str) -> String {
    let flat: String = content.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }).collect();
    let lower = flat.to_lowercase();
    let query_lower = query.to_lowercase();

    let Some(first_term) = query_lower.split_whitespace().next() else {
        return flat.chars().take(SNIPPET_RADIUS * 2).collect();
    };
    let byte_pos = lower.find(first_term).unwrap_or(0);
    let char_pos = lower[..byte_pos].chars().count();

    let start = char_pos.saturating_sub(SNIPPET_RADIUS);
    let end = (char_pos + first_term.chars().count() + SNIPPET_RADIUS).min(flat.chars().count());
    flat.chars().skip(start).take(end - start).collect()
}

fn load_active_watches(pool: &Arc<ConnectionPool>) -> CortexResult<Vec<WatchQuery>> {
    pool.readers.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT id, query, threshold, delivery_channel, webhook_url, agent_id, active,
                        created_at, last_matched_at, match_count
                 FROM watch_queries WHERE active = 1",
            )
            .map_err(|e| to_err(e.to_string()))?;
        let rows = stmt.query_map([], watch_from_row).map_err(|e| to_err(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| to_err(e.to_string()))
    })
}

fn watch_from_row(row: &rusqlite::Row) -> rusqlite::Result<WatchQuery> {
    let delivery_channel: String = row.get(3)?;
    let agent_id: String = row.get(5)?;
    Ok(WatchQuery {
        id: row.get(0)?,
        query: row.get(1)?,
        threshold: row.get(2)?,
        delivery_channel: DeliveryChannel::parse(&delivery_channel).map_err(to_sqlite_err)?,
        webhook_url: row.get(4)?,
        agent_id: if agent_id.is_empty() { None } else { Some(agent_id) },
        active: row.get::<_, i64>(6)? != 0,
        created_at: row.get::<_, DateTime<Utc>>(7)?,
        last_matched_at: row.get::<_, Option<DateTime<Utc>>>(8)?,
        match_count: row.get(9)?,
    })
}

fn to_sqlite_err(e: CortexError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))
}

fn record_match(pool: &Arc<ConnectionPool>, watch_id: i64) -> CortexResult<()> {
    pool.writer.with_conn_sync(|conn| {
        conn.execute(
            "UPDATE watch_queries SET match_count = match_count + 1, last_matched_at = ?1 WHERE id = ?2",
            params![Utc::now(), watch_id],
        )
        .map_err(|e| to_err(e.to_string()))?;
        Ok(())
    })
}

fn memory_content(pool: &Arc<ConnectionPool>, memory_id: i64) -> CortexResult<Option<String>> {
    pool.readers.with_conn(|conn| {
        conn.query_row("SELECT content FROM memories WHERE id = ?1 AND deleted_at IS NULL", params![memory_id], |row| row.get(0))
            .optional()
            .map_err(|e| to_err(e.to_string()))
    })
}

/// Scores every active watch against `memory_id`'s content; for each watch
/// scoring at or above its threshold, records a `match` alert, bumps the
/// watch's match stats, and — when a webhook notifier is supplied and the
/// watch's delivery channel is `webhook` — enqueues the alert for delivery.
/// Returns the alerts created.
pub fn check_watches_for_memory<T: WebhookTransport>(
    pool: &Arc<ConnectionPool>,
    alerts: &AlertRepository,
    memory_id: i64,
    webhook: Option<&WebhookNotifier<T>>,
) -> CortexResult<Vec<Alert>> {
    let Some(content) = memory_content(pool, memory_id)? else {
        return Ok(Vec::new());
    };

    let watches = load_active_watches(pool)?;
    let mut created = Vec::new();

    for watch in watches {
        let score = score_watch(&watch.query, &content);
        if score < watch.threshold {
            continue;
        }

        let snippet = snippet_around_match(&content, &watch.query);
        let message = format!("watch \"{}\" matched memory #{memory_id}: \u{2026}{snippet}\u{2026}", watch.query);

        let mut alert = NewAlert::new(AlertType::Match, AlertSeverity::Info, message);
        alert.agent_id = watch.agent_id.clone();
        alert.detail = serde_json::json!({ "watch_id": watch.id, "memory_id": memory_id, "score": score }).to_string();

        let id = alerts.insert(alert)?;
        record_match(pool, watch.id)?;

        if let Some(created_alert) = alerts.get(id)? {
            if matches!(watch.delivery_channel, DeliveryChannel::Webhook) {
                if let Some(notifier) = webhook {
                    notifier.notify(&created_alert);
                }
            }
            created.push(created_alert);
        }
    }

    Ok(created)
}
