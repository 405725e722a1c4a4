//! Observability reports: headline counts, db size, confidence
//! distribution, fact-type histogram, and import freshness buckets.

mod basic;
mod extended;

pub use basic::{basic_stats, BasicStats};
pub use extended::{extended_stats, ConfidenceDistribution, ExtendedStats, FreshnessBuckets};
