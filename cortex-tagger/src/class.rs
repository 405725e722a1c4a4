use cortex_core::errors::CortexResult;
use cortex_core::model::MemoryClass;

/// Trims and lowercases `raw`, validating it against the six memory-class
/// labels; `""` is accepted as the default (untagged) sentinel.
pub fn normalize_memory_class(raw: &str) -> CortexResult<String> {
    MemoryClass::normalize_and_validate(raw)
}
