//! Data types for source rows, chunks, embeddings, and retrieval results.
//!
//! This is the one schema shared by ingestion and retrieval. Store payloads
//! carry a `schema_version` field so that payloads written by older pipelines
//! can be migrated when they are read back (see [`RetrievalMatch::from_payload`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RagError, Result};

/// Version written into every point payload.
///
/// Version 0 is the legacy layout that flattened the whole source row into the
/// payload (`title`, `author`, `link`, `article`, `hash`).
pub const SCHEMA_VERSION: u64 = 1;

/// Payload key holding the chunk text.
pub const CHUNK_TEXT_KEY: &str = "chunk_text";

/// One ingested source row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawDocument {
    /// Zero-based row index in the source file.
    pub row_id: u64,
    /// Article title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Article author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// URL or file name the article came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Full article body.
    pub text: String,
    /// Fingerprint of the entire row, for change detection.
    pub hash: String,
}

impl RawDocument {
    /// Metadata carried from this document onto each of its chunks.
    pub fn chunk_metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            author: self.author.clone(),
            source: self.source.clone(),
            title: self.title.clone(),
        }
    }
}

/// Citation metadata inherited from the parent [`RawDocument`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Article author.
    pub author: Option<String>,
    /// URL or file name.
    pub source: Option<String>,
    /// Article title.
    pub title: Option<String>,
}

/// A contiguous or sentence-grouped span of a document's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// `{row_id}_chunk_{sequence}_{hash[..8]}`, unique within the document.
    pub chunk_id: String,
    /// The chunk text.
    pub chunk_text: String,
    /// SHA-256 of the normalized chunk text.
    pub chunk_hash: String,
    /// Row id of the parent document.
    pub source_row_id: u64,
    /// Position of this chunk in the parent document.
    pub sequence: usize,
    /// Metadata inherited from the parent document.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Build the store payload for this chunk.
    ///
    /// Absent metadata fields are written as JSON `null` so every point has
    /// the same payload keys.
    pub fn to_payload(&self) -> Map<String, Value> {
        let opt = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

        let mut payload = Map::new();
        payload.insert("author".into(), opt(&self.metadata.author));
        payload.insert("source".into(), opt(&self.metadata.source));
        payload.insert("title".into(), opt(&self.metadata.title));
        payload.insert("source_row_id".into(), Value::from(self.source_row_id));
        payload.insert("chunk_id".into(), Value::String(self.chunk_id.clone()));
        payload.insert("chunk_hash".into(), Value::String(self.chunk_hash.clone()));
        payload.insert(CHUNK_TEXT_KEY.into(), Value::String(self.chunk_text.clone()));
        payload.insert("schema_version".into(), Value::from(SCHEMA_VERSION));
        payload
    }
}

/// A sparse term vector: parallel `(index, weight)` arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SparseVector {
    /// Term indices. Not required to be sorted.
    pub indices: Vec<u32>,
    /// Non-negative term weights, one per index.
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Create a sparse vector, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the arrays differ in length or a
    /// weight is negative or not finite.
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Result<Self> {
        let vector = Self { indices, values };
        vector.validate()?;
        Ok(vector)
    }

    /// Check that indices and values pair up and every weight is valid.
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() != self.values.len() {
            return Err(RagError::EmbeddingError {
                provider: "sparse".into(),
                message: format!(
                    "sparse vector has {} indices but {} values",
                    self.indices.len(),
                    self.values.len()
                ),
            });
        }
        if let Some(bad) = self.values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(RagError::EmbeddingError {
                provider: "sparse".into(),
                message: format!("sparse weight {bad} is negative or not finite"),
            });
        }
        Ok(())
    }

    /// Number of non-zero entries.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the vector has no salient terms.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product with another sparse vector.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let lookup: std::collections::HashMap<u32, f32> =
            other.indices.iter().copied().zip(other.values.iter().copied()).collect();
        self.indices
            .iter()
            .zip(&self.values)
            .filter_map(|(i, v)| lookup.get(i).map(|w| v * w))
            .sum()
    }
}

/// A [`Chunk`] with its dense and (for hybrid ingestion) sparse vectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    /// The embedded chunk.
    pub chunk: Chunk,
    /// Dense embedding. Required by both collections.
    pub dense_vector: Option<Vec<f32>>,
    /// Sparse BM25 embedding. Required by the hybrid collection only.
    pub sparse_vector: Option<SparseVector>,
}

/// One scored result from a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalMatch {
    /// Store point identifier.
    pub id: String,
    /// Similarity or fusion score (higher is more relevant).
    pub score: f32,
    /// Chunk text.
    pub text: String,
    /// All other payload fields.
    pub metadata: Map<String, Value>,
}

impl RetrievalMatch {
    /// Build a match from a stored payload, migrating legacy layouts.
    ///
    /// Version 0 payloads keep the chunk text under `text` or `article` and
    /// the source under `link`; both are rewritten to the current keys.
    pub fn from_payload(id: String, score: f32, mut payload: Map<String, Value>) -> Self {
        let version = payload.get("schema_version").and_then(Value::as_u64).unwrap_or(0);
        if version == 0 {
            if let Some(link) = payload.remove("link") {
                payload.entry("source").or_insert(link);
            }
        }

        let text = [CHUNK_TEXT_KEY, "text", "article"]
            .iter()
            .find_map(|key| payload.remove(*key).and_then(|v| v.as_str().map(str::to_owned)))
            .unwrap_or_default();

        Self { id, score, text, metadata: payload }
    }

    /// The chunk id recorded in the payload, if any.
    pub fn chunk_id(&self) -> Option<&str> {
        self.metadata.get("chunk_id").and_then(Value::as_str)
    }
}
