//! Collaborator interfaces: narrow traits the core depends on
//! without depending on any concrete LLM/embedding/importer implementation.

use crate::errors::CortexResult;
use crate::model::{Fact, Memory};

/// Turns text into dense vectors. Implementations own model hosting/hashing;
/// the core only requires dimensional consistency with its configured store.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, texts: &[String]) -> CortexResult<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
}

/// Extracts structured facts from an imported memory.
pub trait FactExtractor: Send + Sync {
    fn extract(&self, memory: &Memory) -> CortexResult<Vec<Fact>>;
}

/// Used by external governors (alert digests, dedup summaries); not called
/// by the core engine itself.
pub trait LlmProvider: Send + Sync {
    fn complete(&self, prompt: &str, opts: &CompletionOptions) -> CortexResult<String>;
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Feeds memory + metadata into the core. The core is purely reactive: it
/// never pulls from an importer, only accepts pushes.
pub trait Importer: Send + Sync {
    fn next_memory(&mut self) -> CortexResult<Option<(Memory, Option<serde_json::Value>)>>;
}
