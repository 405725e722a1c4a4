use std::collections::HashMap;

use cortex_core::config::defaults::{DEFAULT_DEDUP_MAX_PREVIEW, DEFAULT_DEDUP_SIMILARITY_THRESHOLD};
use cortex_core::errors::CortexResult;
use cortex_core::model::Fact;

use crate::repository::FactRepository;
use crate::similarity::{normalize_group_key, object_similarity};

#[derive(Debug, Clone)]
pub struct DedupOptions {
    pub threshold: f64,
    pub max_preview: usize,
    pub dry_run: bool,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DEDUP_SIMILARITY_THRESHOLD,
            max_preview: DEFAULT_DEDUP_MAX_PREVIEW,
            dry_run: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupPair {
    pub winner_id: i64,
    pub loser_id: i64,
    pub similarity: f64,
}

#[derive(Debug, Clone)]
pub struct DedupReport {
    pub pairs: Vec<DedupPair>,
    pub truncated: bool,
    pub applied: bool,
}

/// Finds near-duplicate active facts grouped by normalized `(subject,
/// predicate)` and either previews or applies the supersession.
pub fn dedup(repo: &FactRepository, opts: &DedupOptions) -> CortexResult<DedupReport> {
    let facts = repo.list_active()?;

    let mut groups: HashMap<(String, String), Vec<Fact>> = HashMap::new();
    for fact in facts {
        let key = (normalize_group_key(&fact.subject), normalize_group_key(&fact.predicate));
        groups.entry(key).or_default().push(fact);
    }

    let mut pairs: Vec<DedupPair> = Vec::new();
    let mut group_keys: Vec<_> = groups.keys().cloned().collect();
    group_keys.sort();

    for key in group_keys {
        let mut candidates = groups.remove(&key).unwrap();
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_reinforced.cmp(&a.last_reinforced))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut winners: Vec<Fact> = Vec::new();
        for candidate in candidates {
            let best_match = winners
                .iter()
                .map(|w| (w.id, object_similarity(&candidate.object, &w.object)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            match best_match {
                Some((winner_id, sim)) if sim >= opts.threshold => {
                    pairs.push(DedupPair {
                        winner_id,
                        loser_id: candidate.id,
                        similarity: sim,
                    });
                }
                _ => winners.push(candidate),
            }
        }
    }

    pairs.sort_by(|a, b| a.winner_id.cmp(&b.winner_id).then_with(|| a.loser_id.cmp(&b.loser_id)));

    let truncated = pairs.len() > opts.max_preview;
    let preview: Vec<DedupPair> = pairs.iter().take(opts.max_preview).cloned().collect();

    if opts.dry_run {
        return Ok(DedupReport {
            pairs: preview,
            truncated,
            applied: false,
        });
    }

    for pair in &pairs {
        let reason = format!("dedup-facts similarity={:.2}", pair.similarity);
        match repo.supersede(pair.loser_id, pair.winner_id, &reason) {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {}
            Err(e) => return Err(e),
        }
    }

    Ok(DedupReport {
        pairs: preview,
        truncated,
        applied: true,
    })
}
