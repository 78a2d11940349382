//! Configuration for chunking, embedding, storage, and retrieval.
//!
//! A [`RagConfig`] is loaded once (from YAML or built in code), validated, and
//! then passed explicitly into each component's constructor.
//!
//! ```yaml
//! chunking:
//!   strategy: character
//!   chunk_size: 1000
//!   chunk_overlap: 200
//! store:
//!   url: http://localhost:6334
//!   collection_prefix: articles
//! retrieval:
//!   merge_strategy: min_max
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// How raw document text is segmented into chunks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Fixed character window with overlap.
    Character,
    /// Fixed token window with overlap.
    Token,
    /// Groups of consecutive sentences.
    Sentence,
    /// Paragraphs kept whole when they fit, token windows otherwise.
    #[default]
    Recursive,
}

/// Which backend produces dense embeddings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Local ONNX sentence-embedding model.
    #[default]
    FastEmbed,
    /// OpenAI-compatible `/v1/embeddings` HTTP endpoint.
    OpenAi,
}

/// How store point identifiers are derived from a chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PointIdStrategy {
    /// From the normalized content hash. Identical text maps to one point.
    #[default]
    ContentHash,
    /// From the position-aware chunk id (`{row}_chunk_{n}_{hash8}`).
    ChunkId,
}

/// How the dense-only and hybrid result lists are combined by the runner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Concatenate and sort by raw score, mixing cosine and RRF scales.
    RawScore,
    /// Min-max normalize each list to `[0, 1]`, then sort.
    MinMax,
    /// Second reciprocal-rank-fusion pass over both lists.
    #[default]
    ReciprocalRank,
}

/// Chunker selection and window sizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Segmentation strategy.
    pub strategy: ChunkingStrategy,
    /// Window size, in characters or tokens depending on the strategy.
    pub chunk_size: usize,
    /// Overlap between consecutive windows, same unit as `chunk_size`.
    pub chunk_overlap: usize,
    /// Sentences per chunk for [`ChunkingStrategy::Sentence`].
    pub max_sentences: usize,
    /// Model name used to resolve the BPE tokenizer.
    pub tokenizer_model: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Recursive,
            chunk_size: 300,
            chunk_overlap: 50,
            max_sentences: 5,
            tokenizer_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Dense and sparse encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Dense embedding backend.
    pub provider: EmbeddingProviderKind,
    /// Dense model name.
    pub dense_model: String,
    /// Dimensionality every dense vector must have.
    pub dense_dimensions: usize,
    /// Sparse model name. Only `Qdrant/bm25` is supported.
    pub sparse_model: String,
    /// Number of texts sent to an encoder per call.
    pub batch_size: usize,
    /// Base URL override for OpenAI-compatible endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key for HTTP backends.
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::FastEmbed,
            dense_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dense_dimensions: 384,
            sparse_model: "Qdrant/bm25".to_string(),
            batch_size: 64,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Vector store connection and write behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Store endpoint (Qdrant gRPC).
    pub url: String,
    /// Prefix for the `{prefix}_dense_collection` and `{prefix}_hybrid_collection` names.
    pub collection_prefix: String,
    /// Maximum number of concurrent upload requests per batch.
    pub upload_parallelism: usize,
    /// Wait for the store to acknowledge each write before returning.
    pub wait: bool,
    /// Point identifier derivation.
    pub point_id: PointIdStrategy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection_prefix: "articles".to_string(),
            upload_parallelism: 4,
            wait: true,
            point_id: PointIdStrategy::ContentHash,
        }
    }
}

impl StoreConfig {
    /// Name of the dense-only collection.
    pub fn dense_collection(&self) -> String {
        format!("{}_dense_collection", self.collection_prefix)
    }

    /// Name of the dense + sparse collection.
    pub fn hybrid_collection(&self) -> String {
        format!("{}_hybrid_collection", self.collection_prefix)
    }
}

/// Query-time limits, thresholds, and fusion parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results requested from the dense-only collection.
    pub top_k: usize,
    /// Minimum cosine similarity for dense-only results.
    pub score_threshold: f32,
    /// Results kept after hybrid fusion.
    pub hybrid_k: usize,
    /// Candidates fetched from the dense field before fusion.
    pub dense_limit: usize,
    /// Candidates fetched from the sparse field before fusion.
    pub sparse_limit: usize,
    /// The constant added to each rank in reciprocal rank fusion.
    pub rank_constant: f32,
    /// Minimum fused score for hybrid results.
    pub fused_score_threshold: f32,
    /// Results returned by the runner after merging both collections.
    pub final_k: usize,
    /// How the runner merges the two result lists.
    pub merge_strategy: MergeStrategy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            score_threshold: 0.5,
            hybrid_k: 5,
            dense_limit: 20,
            sparse_limit: 20,
            rank_constant: 60.0,
            fused_score_threshold: 0.0,
            final_k: 3,
            merge_strategy: MergeStrategy::ReciprocalRank,
        }
    }
}

/// Top-level configuration passed to every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Chunker settings.
    pub chunking: ChunkingConfig,
    /// Encoder settings.
    pub embedding: EmbeddingConfig,
    /// Vector store settings.
    pub store: StoreConfig,
    /// Retrieval settings.
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse and validate a YAML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the YAML is malformed or the
    /// resulting configuration fails [`validate`](RagConfig::validate).
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: RagConfig = serde_yaml::from_str(yaml)
            .map_err(|e| RagError::ConfigError(format!("invalid YAML configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize the configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| RagError::ConfigError(format!("failed to serialize configuration: {e}")))
    }

    /// Check that all parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if chunking.strategy != ChunkingStrategy::Sentence
            && chunking.chunk_overlap >= chunking.chunk_size
        {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if chunking.max_sentences == 0 {
            return Err(RagError::ConfigError("max_sentences must be greater than zero".into()));
        }

        let embedding = &self.embedding;
        if embedding.dense_dimensions == 0 {
            return Err(RagError::ConfigError("dense_dimensions must be greater than zero".into()));
        }
        if embedding.batch_size == 0 {
            return Err(RagError::ConfigError("batch_size must be greater than zero".into()));
        }

        let store = &self.store;
        if store.collection_prefix.trim().is_empty() {
            return Err(RagError::ConfigError("collection_prefix must not be empty".into()));
        }
        if store.upload_parallelism == 0 {
            return Err(RagError::ConfigError(
                "upload_parallelism must be greater than zero".into(),
            ));
        }

        let retrieval = &self.retrieval;
        for (name, value) in [
            ("top_k", retrieval.top_k),
            ("hybrid_k", retrieval.hybrid_k),
            ("dense_limit", retrieval.dense_limit),
            ("sparse_limit", retrieval.sparse_limit),
            ("final_k", retrieval.final_k),
        ] {
            if value == 0 {
                return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        if !retrieval.rank_constant.is_finite() || retrieval.rank_constant < 0.0 {
            return Err(RagError::ConfigError(format!(
                "rank_constant must be a non-negative finite number, got {}",
                retrieval.rank_constant
            )));
        }
        for (name, value) in [
            ("score_threshold", retrieval.score_threshold),
            ("fused_score_threshold", retrieval.fused_score_threshold),
        ] {
            if !value.is_finite() {
                return Err(RagError::ConfigError(format!("{name} must be finite, got {value}")));
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the chunking strategy.
    pub fn chunking_strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.chunking.strategy = strategy;
        self
    }

    /// Set the chunk window size.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunking.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunk windows.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunking.chunk_overlap = overlap;
        self
    }

    /// Set the number of sentences grouped per chunk.
    pub fn max_sentences(mut self, n: usize) -> Self {
        self.config.chunking.max_sentences = n;
        self
    }

    /// Set the model whose tokenizer drives token windows.
    pub fn tokenizer_model(mut self, model: impl Into<String>) -> Self {
        self.config.chunking.tokenizer_model = model.into();
        self
    }

    /// Set the dense embedding dimensionality.
    pub fn dense_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding.dense_dimensions = dims;
        self
    }

    /// Set the encoder batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.embedding.batch_size = size;
        self
    }

    /// Set the collection name prefix.
    pub fn collection_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.store.collection_prefix = prefix.into();
        self
    }

    /// Set the point identifier strategy.
    pub fn point_id(mut self, strategy: PointIdStrategy) -> Self {
        self.config.store.point_id = strategy;
        self
    }

    /// Set the dense-only result count and similarity threshold.
    pub fn dense_search(mut self, top_k: usize, score_threshold: f32) -> Self {
        self.config.retrieval.top_k = top_k;
        self.config.retrieval.score_threshold = score_threshold;
        self
    }

    /// Set the hybrid result count and per-field candidate limits.
    pub fn hybrid_search(mut self, k: usize, dense_limit: usize, sparse_limit: usize) -> Self {
        self.config.retrieval.hybrid_k = k;
        self.config.retrieval.dense_limit = dense_limit;
        self.config.retrieval.sparse_limit = sparse_limit;
        self
    }

    /// Set the reciprocal rank fusion constant.
    pub fn rank_constant(mut self, constant: f32) -> Self {
        self.config.retrieval.rank_constant = constant;
        self
    }

    /// Set the minimum fused score for hybrid results.
    pub fn fused_score_threshold(mut self, threshold: f32) -> Self {
        self.config.retrieval.fused_score_threshold = threshold;
        self
    }

    /// Set the runner's final result count and merge strategy.
    pub fn merge(mut self, final_k: usize, strategy: MergeStrategy) -> Self {
        self.config.retrieval.final_k = final_k;
        self.config.retrieval.merge_strategy = strategy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if validation fails.
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
