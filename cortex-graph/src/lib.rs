//! Typed fact edges, a co-occurrence accumulator, BFS traversal, and a
//! rule-based inference engine that proposes new edges from graph structure.

mod cooccurrence;
mod edges;
mod inference;
mod traversal;

pub use cooccurrence::{CooccurrenceStore, CooccurrenceSuggestion};
pub use edges::EdgeRepository;
pub use inference::{run as run_inference, InferenceOptions, InferenceReport};
pub use traversal::{traverse, GraphNode, TraversalError};
