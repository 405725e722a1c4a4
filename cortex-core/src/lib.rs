//! Core types, errors, config, and collaborator traits for the Cortex memory substrate.
//!
//! `cortex-core` has no knowledge of SQLite, HNSW, or HTTP — it is the shared
//! vocabulary every other `cortex-*` crate builds on.

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod hash;
pub mod model;
pub mod traits;

pub use errors::{CortexError, CortexResult};
