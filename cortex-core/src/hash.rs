//! Content-hash computation for memory dedup.
//!
//! `hash = SHA-256(source_file || 0x00 || content)`. Two memories with the
//! same content but different source files hash differently.

use sha2::{Digest, Sha256};

/// Compute the canonical content hash for a memory.
pub fn content_hash(source_file: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_file.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to String cannot fail");
    }
    s
}
