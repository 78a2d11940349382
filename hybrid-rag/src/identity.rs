//! Content addressing for rows and chunks.
//!
//! Chunk hashes are computed over normalized text (lower-cased, whitespace
//! collapsed, trimmed), so casing and spacing differences never change a
//! chunk's identity. Store point ids are UUIDs formatted from the first 128
//! bits of a hash, which keeps re-ingestion of unchanged content idempotent.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::PointIdStrategy;
use crate::document::Chunk;
use crate::error::{RagError, Result};

/// Unicode `White_Space` plus the ASCII information separators U+001C..=U+001F,
/// which Python's `str.isspace` and regex `\s` also treat as whitespace.
fn is_space(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Lower-case, collapse whitespace runs to a single space, and trim.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    lowered.split(is_space).filter(|word| !word.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Whether `text` normalizes to the empty string.
pub fn is_blank(text: &str) -> bool {
    text.chars().all(is_space)
}

/// Hex-encoded SHA-256 of arbitrary bytes.
fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Stable content hash of a chunk's normalized text.
pub fn chunk_hash(text: &str) -> String {
    sha256_hex(normalize(text).as_bytes())
}

/// Per-document chunk identifier: `{row_id}_chunk_{index}_{hash[..8]}`.
pub fn chunk_id(row_id: u64, index: usize, hash: &str) -> String {
    let prefix = hash.get(..8).unwrap_or(hash);
    format!("{row_id}_chunk_{index}_{prefix}")
}

/// Fingerprint of a whole source row.
///
/// The row is serialized as compact JSON with keys in sorted order, so the
/// hash depends only on column names and cell values.
pub fn row_hash(fields: &BTreeMap<String, Option<String>>) -> String {
    // Serializing a map of strings cannot fail.
    let canonical = serde_json::to_string(fields).unwrap_or_default();
    sha256_hex(canonical.as_bytes())
}

/// Format the first 32 hex characters of a hash as a UUID.
///
/// # Errors
///
/// Returns [`RagError::ChunkingError`] if `hash` is shorter than 32 characters
/// or not hexadecimal.
pub fn uuid_from_hash(hash: &str) -> Result<String> {
    let prefix = hash
        .get(..32)
        .ok_or_else(|| RagError::ChunkingError(format!("hash '{hash}' is too short for a UUID")))?;
    let uuid = Uuid::try_parse(prefix)
        .map_err(|e| RagError::ChunkingError(format!("hash '{hash}' is not hexadecimal: {e}")))?;
    Ok(uuid.hyphenated().to_string())
}

/// Derive the deterministic store identifier for a chunk.
pub fn point_id(chunk: &Chunk, strategy: PointIdStrategy) -> Result<String> {
    match strategy {
        PointIdStrategy::ContentHash => uuid_from_hash(&chunk.chunk_hash),
        PointIdStrategy::ChunkId => uuid_from_hash(&sha256_hex(chunk.chunk_id.as_bytes())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_case_and_whitespace() {
        assert_eq!(normalize("  Hello\n\tWORLD   again "), "hello world again");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn information_separators_count_as_whitespace() {
        assert_eq!(normalize("alpha\u{1f}beta\u{1c}"), "alpha beta");
        assert_eq!(chunk_hash("alpha\u{1f}beta"), chunk_hash("alpha beta"));
        assert_eq!(chunk_hash("\u{85}Alpha\u{3000}Beta"), chunk_hash("alpha beta"));
    }

    #[test]
    fn chunk_hash_is_hex_sha256() {
        let hash = chunk_hash("abc");
        assert_eq!(hash.len(), 64);
        // sha256("abc")
        assert_eq!(hash, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn chunk_id_uses_hash_prefix() {
        assert_eq!(chunk_id(7, 2, "deadbeefcafe"), "7_chunk_2_deadbeef");
        assert_eq!(chunk_id(0, 0, "abc"), "0_chunk_0_abc");
    }

    #[test]
    fn uuid_from_hash_is_deterministic() {
        let hash = chunk_hash("some text");
        let a = uuid_from_hash(&hash).unwrap();
        let b = uuid_from_hash(&hash).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(a.replace('-', ""), hash[..32]);
    }

    #[test]
    fn uuid_from_hash_rejects_bad_input() {
        assert!(uuid_from_hash("abc").is_err());
        assert!(uuid_from_hash(&"z".repeat(64)).is_err());
    }

    #[test]
    fn row_hash_ignores_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("title".to_string(), Some("T".to_string()));
        a.insert("text".to_string(), Some("body".to_string()));
        let mut b = BTreeMap::new();
        b.insert("text".to_string(), Some("body".to_string()));
        b.insert("title".to_string(), Some("T".to_string()));
        assert_eq!(row_hash(&a), row_hash(&b));

        b.insert("author".to_string(), None);
        assert_ne!(row_hash(&a), row_hash(&b));
    }
}
