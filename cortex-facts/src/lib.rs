//! Fact repository: CRUD, supersession, weighted reinforcement, cross-agent
//! amplification, and similarity-based dedup over the `facts` table.

mod dedup;
mod list_options;
mod repository;
mod row;
mod similarity;

pub use dedup::{dedup, DedupOptions, DedupPair, DedupReport};
pub use list_options::ListFactsOptions;
pub use repository::{FactRepository, NewFact};
pub use similarity::{normalize_group_key, normalized_levenshtein, object_similarity, token_jaccard};
