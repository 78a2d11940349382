//! Dense and sparse embedding providers, and the service that applies them to chunks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::EmbeddingConfig;
use crate::document::{Chunk, EmbeddedChunk, SparseVector};
use crate::error::{RagError, Result};
use crate::vectorstore::CollectionKind;

/// A provider that generates dense vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// A provider that generates sparse weighted-term vectors.
///
/// Documents and queries may be weighted differently (BM25 weights document
/// terms by frequency but query terms uniformly), so the query path has its
/// own method that defaults to the document path.
#[async_trait]
pub trait SparseEmbeddingProvider: Send + Sync {
    /// Encode a document text.
    async fn embed_sparse(&self, text: &str) -> Result<SparseVector>;

    /// Encode a batch of document texts, in input order.
    async fn embed_sparse_batch(&self, texts: &[&str]) -> Result<Vec<SparseVector>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_sparse(text).await?);
        }
        Ok(results)
    }

    /// Encode a query text.
    async fn embed_sparse_query(&self, text: &str) -> Result<SparseVector> {
        self.embed_sparse(text).await
    }

    /// Name of the sparse model.
    fn model_name(&self) -> &str;
}

/// Build the dense provider selected by `config`.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if the backend's cargo feature is not
/// enabled, or the backend's own error if it cannot be initialized.
pub fn dense_provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        #[cfg(feature = "fastembed")]
        crate::config::EmbeddingProviderKind::FastEmbed => {
            Ok(Arc::new(crate::fastembed::FastEmbedProvider::new(&config.dense_model)?))
        }
        #[cfg(feature = "openai")]
        crate::config::EmbeddingProviderKind::OpenAi => {
            let mut provider =
                crate::openai::OpenAIEmbeddingProvider::from_env_var(&config.api_key_env)?
                    .with_model(&config.dense_model)
                    .with_expected_dimensions(config.dense_dimensions);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Ok(Arc::new(provider))
        }
        #[allow(unreachable_patterns)]
        other => Err(RagError::ConfigError(format!(
            "embedding provider {other:?} is not enabled in this build"
        ))),
    }
}

/// Dense and sparse vectors for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEmbedding {
    /// Dense query vector.
    pub dense: Vec<f32>,
    /// Sparse query vector; `None` in dense-only mode.
    pub sparse: Option<SparseVector>,
}

/// Applies the dense and sparse providers to chunks and queries.
///
/// Output is one-to-one with input and in input order. Every dense vector is
/// checked against the declared dimensionality, since a collection only
/// accepts vectors of the size it was created with.
pub struct EmbeddingService {
    dense: Arc<dyn EmbeddingProvider>,
    sparse: Option<Arc<dyn SparseEmbeddingProvider>>,
    dimensions: usize,
    batch_size: usize,
}

impl EmbeddingService {
    /// Create a service around a dense provider and an optional sparse provider.
    ///
    /// `dimensions` is the size every collection is created with.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `batch_size` is zero or the dense
    /// provider reports a different dimensionality than `dimensions`.
    pub fn new(
        dense: Arc<dyn EmbeddingProvider>,
        sparse: Option<Arc<dyn SparseEmbeddingProvider>>,
        dimensions: usize,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(RagError::ConfigError("batch_size must be greater than zero".into()));
        }
        if dense.dimensions() != dimensions {
            return Err(RagError::ConfigError(format!(
                "dense provider produces {} dimensions but collections declare {dimensions}",
                dense.dimensions()
            )));
        }
        Ok(Self { dense, sparse, dimensions, batch_size })
    }

    /// The declared dense dimensionality.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Whether a sparse provider is configured.
    pub fn supports_hybrid(&self) -> bool {
        self.sparse.is_some()
    }

    fn sparse_provider(&self) -> Result<&Arc<dyn SparseEmbeddingProvider>> {
        self.sparse.as_ref().ok_or_else(|| {
            RagError::ConfigError("hybrid embedding requires a sparse embedding provider".into())
        })
    }

    fn check_dense(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(RagError::EmbeddingError {
                provider: "dense".into(),
                message: format!(
                    "expected {}-dimensional vector, got {}",
                    self.dimensions,
                    vector.len()
                ),
            });
        }
        Ok(())
    }

    /// Embed chunks for the given collection kind.
    ///
    /// Hybrid mode computes both vectors; dense mode leaves `sparse_vector`
    /// as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if a provider fails, returns the
    /// wrong number of vectors, or returns a vector of the wrong size.
    pub async fn embed_chunks(
        &self,
        chunks: &[Chunk],
        kind: CollectionKind,
    ) -> Result<Vec<EmbeddedChunk>> {
        if kind == CollectionKind::Hybrid {
            self.sparse_provider()?;
        }

        let mut embedded = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.chunk_text.as_str()).collect();

            let dense = self.dense.embed_batch(&texts).await.map_err(|e| {
                error!(batch_size = texts.len(), error = %e, "dense embedding failed");
                e
            })?;
            if dense.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: "dense".into(),
                    message: format!("{} vectors returned for {} texts", dense.len(), batch.len()),
                });
            }
            for vector in &dense {
                self.check_dense(vector)?;
            }

            let sparse: Vec<Option<SparseVector>> = match kind {
                CollectionKind::Hybrid => {
                    let vectors = self.sparse_provider()?.embed_sparse_batch(&texts).await?;
                    if vectors.len() != batch.len() {
                        return Err(RagError::EmbeddingError {
                            provider: "sparse".into(),
                            message: format!(
                                "{} vectors returned for {} texts",
                                vectors.len(),
                                batch.len()
                            ),
                        });
                    }
                    vectors.into_iter().map(Some).collect()
                }
                CollectionKind::Dense => vec![None; batch.len()],
            };

            embedded.extend(batch.iter().zip(dense).zip(sparse).map(|((chunk, d), s)| {
                EmbeddedChunk { chunk: chunk.clone(), dense_vector: Some(d), sparse_vector: s }
            }));
            debug!(batch_size = batch.len(), ?kind, "embedded chunk batch");
        }

        info!(chunk_count = embedded.len(), ?kind, "embedded chunks");
        Ok(embedded)
    }

    /// Embed a query for the given collection kind.
    pub async fn embed_query(&self, query: &str, kind: CollectionKind) -> Result<QueryEmbedding> {
        let dense = self.dense.embed(query).await?;
        self.check_dense(&dense)?;
        let sparse = match kind {
            CollectionKind::Hybrid => {
                Some(self.sparse_provider()?.embed_sparse_query(query).await?)
            }
            CollectionKind::Dense => None,
        };
        Ok(QueryEmbedding { dense, sparse })
    }
}
