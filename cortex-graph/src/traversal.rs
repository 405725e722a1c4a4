use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use cortex_core::cancellation::Cancellable;
use cortex_core::config::defaults::DEFAULT_MIN_COOCCURRENCE_COUNT;
use cortex_core::errors::CortexError;
use cortex_core::model::{Fact, FactEdge};
use cortex_facts::FactRepository;
use cortex_storage::ConnectionPool;

use crate::cooccurrence::CooccurrenceStore;
use crate::edges::EdgeRepository;

/// One hop of a [`traverse`] result: the fact at this depth, the edges that
/// were followed to reach its neighbors, and the hop count from `start`.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub fact: Fact,
    pub edges: Vec<FactEdge>,
    pub depth: u32,
}

/// Returned when [`traverse`] is cancelled mid-walk: carries whatever nodes
/// had already been collected alongside the cancellation error, mirroring
/// `std::io::IntoInnerError`'s "failure plus the thing you'd otherwise have
/// gotten back" shape.
#[derive(Debug)]
pub struct TraversalError {
    pub partial: Vec<GraphNode>,
    pub source: CortexError,
}

impl fmt::Display for TraversalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} nodes collected before cancellation)", self.source, self.partial.len())
    }
}

impl std::error::Error for TraversalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Breadth-first traversal of the fact graph from `start`, following typed
/// edges with `confidence >= min_confidence` and strong-cooccurrence
/// neighbors (`count >= DEFAULT_MIN_COOCCURRENCE_COUNT`), up to `max_depth`
/// hops. Per-node storage failures (fact fetch, edge fetch, cooccurrence
/// lookup) are logged and skipped rather than aborting the walk. If `cancel`
/// fires mid-walk, returns [`TraversalError`] with everything collected so
/// far.
pub fn traverse(
    pool: &Arc<ConnectionPool>,
    start: i64,
    max_depth: u32,
    min_confidence: f64,
    cancel: &impl Cancellable,
) -> Result<Vec<GraphNode>, TraversalError> {
    let facts = FactRepository::new(pool.clone());
    let edges = EdgeRepository::new(pool.clone());
    let cooccurrence = CooccurrenceStore::new(pool.clone());

    let mut visited: HashSet<i64> = HashSet::new();
    let mut queue: VecDeque<(i64, u32)> = VecDeque::new();
    let mut result = Vec::new();

    visited.insert(start);
    queue.push_back((start, 0));

    while let Some((fact_id, depth)) = queue.pop_front() {
        if cancel.is_cancelled() {
            return Err(TraversalError { partial: result, source: CortexError::Cancelled });
        }

        let fact = match facts.get(fact_id) {
            Ok(Some(fact)) => fact,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(fact_id, error = %e, "traverse: skipping fact fetch failure");
                continue;
            }
        };
        let fact_edges = match edges.edges_for_fact(fact_id, min_confidence) {
            Ok(edges) => edges,
            Err(e) => {
                tracing::warn!(fact_id, error = %e, "traverse: skipping edge fetch failure");
                Vec::new()
            }
        };

        if depth < max_depth {
            for edge in &fact_edges {
                let neighbor = if edge.source_fact_id == fact_id {
                    edge.target_fact_id
                } else {
                    edge.source_fact_id
                };
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, depth + 1));
                }
            }

            match cooccurrence.suggest(DEFAULT_MIN_COOCCURRENCE_COUNT) {
                Ok(suggestions) => {
                    for suggestion in suggestions {
                        let (a, b) = (suggestion.pair.a, suggestion.pair.b);
                        let neighbor = if a == fact_id {
                            Some(b)
                        } else if b == fact_id {
                            Some(a)
                        } else {
                            None
                        };
                        if let Some(neighbor) = neighbor {
                            if visited.insert(neighbor) {
                                queue.push_back((neighbor, depth + 1));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(fact_id, error = %e, "traverse: skipping cooccurrence lookup failure");
                }
            }
        }

        result.push(GraphNode { fact, edges: fact_edges, depth });
    }

    Ok(result)
}
