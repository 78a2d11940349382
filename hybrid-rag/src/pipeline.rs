//! Ingestion pipeline orchestrator.
//!
//! The [`IngestionPipeline`] runs the full ingest workflow: load rows, chunk,
//! embed once in hybrid mode, then write the hybrid collection and the
//! dense-only collection (with sparse vectors stripped).
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_rag::{IngestionPipeline, InMemoryVectorStore, RagConfig};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(RagConfig::default())
//!     .embeddings(Arc::new(embedding_service))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! let report = pipeline.ingest_csv("data/articles.csv").await?;
//! println!("{} chunks from {} documents", report.chunks, report.documents);
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::chunking::{self, Chunker};
use crate::config::RagConfig;
use crate::document::{Chunk, EmbeddedChunk, RawDocument};
use crate::embedding::EmbeddingService;
use crate::error::{RagError, Result};
use crate::ingestion::BatchIngestor;
use crate::loader::CsvLoader;
use crate::vectorstore::{CollectionKind, VectorStore};

/// Counts from one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    /// Source rows read.
    pub documents: usize,
    /// Chunks produced across all rows.
    pub chunks: usize,
    /// Points written to the hybrid collection.
    pub hybrid_points: usize,
    /// Points written to the dense-only collection.
    pub dense_points: usize,
}

/// The ingestion pipeline. Construct one via [`IngestionPipeline::builder()`].
pub struct IngestionPipeline {
    config: RagConfig,
    embeddings: Arc<EmbeddingService>,
    chunker: Arc<dyn Chunker>,
    hybrid: BatchIngestor,
    dense: BatchIngestor,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Create both collections if they do not exist.
    pub async fn create_collections(&self) -> Result<()> {
        self.hybrid.create_collection().await?;
        self.dense.create_collection().await?;
        Ok(())
    }

    /// Split documents into chunks, in document order.
    pub fn chunk_documents(&self, documents: &[RawDocument]) -> Result<Vec<Chunk>> {
        chunking::chunk_documents(self.chunker.as_ref(), documents)
    }

    /// Ingest documents: chunk → embed → write both collections.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if any stage fails.
    ///
    /// Chunks are validated before their collection is written, so a rejected
    /// chunk aborts ingestion with nothing written. Store failures are not
    /// rolled back: the hybrid collection is written before the dense one, and
    /// a backend may split a batch into several requests, so an error can
    /// leave one or both collections partially written. Point ids are
    /// deterministic, so re-running the same ingestion completes it without
    /// duplicates.
    pub async fn ingest(&self, documents: &[RawDocument]) -> Result<IngestionReport> {
        self.create_collections().await.map_err(|e| {
            error!(error = %e, "failed to prepare collections");
            RagError::PipelineError(format!("failed to prepare collections: {e}"))
        })?;

        let chunks = self.chunk_documents(documents)?;
        let mut report = IngestionReport {
            documents: documents.len(),
            chunks: chunks.len(),
            ..Default::default()
        };

        let embedded =
            self.embeddings.embed_chunks(&chunks, CollectionKind::Hybrid).await.map_err(|e| {
                error!(chunk_count = chunks.len(), error = %e, "embedding failed during ingestion");
                RagError::PipelineError(format!("embedding failed: {e}"))
            })?;

        report.hybrid_points = self.hybrid.batch_upsert(&embedded).await.map_err(|e| {
            RagError::PipelineError(format!("hybrid upsert failed: {e}"))
        })?;

        let dense_only: Vec<EmbeddedChunk> = embedded
            .into_iter()
            .map(|e| EmbeddedChunk { sparse_vector: None, ..e })
            .collect();
        report.dense_points = self.dense.batch_upsert(&dense_only).await.map_err(|e| {
            RagError::PipelineError(format!("dense upsert failed: {e}"))
        })?;

        info!(
            documents = report.documents,
            chunks = report.chunks,
            hybrid_points = report.hybrid_points,
            dense_points = report.dense_points,
            "ingestion completed"
        );
        Ok(report)
    }

    /// Load a CSV file and ingest its rows.
    ///
    /// A missing or unreadable file fails before anything is written.
    pub async fn ingest_csv(&self, path: impl AsRef<Path>) -> Result<IngestionReport> {
        let documents = CsvLoader::new(path)?.load()?;
        self.ingest(&documents).await
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// `config`, `embeddings`, and `vector_store` are required. The chunker
/// defaults to the one selected by the config.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    embeddings: Option<Arc<EmbeddingService>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IngestionPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding service. It must have a sparse provider.
    pub fn embeddings(mut self, embeddings: Arc<EmbeddingService>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the configured chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`IngestionPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing, the
    /// config is invalid, or the embedding service cannot produce sparse
    /// vectors or disagrees with the configured dimensionality.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embeddings = self
            .embeddings
            .ok_or_else(|| RagError::ConfigError("embeddings is required".to_string()))?;
        let store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;

        if !embeddings.supports_hybrid() {
            return Err(RagError::ConfigError(
                "ingestion requires a sparse embedding provider".to_string(),
            ));
        }
        if embeddings.dimensions() != config.embedding.dense_dimensions {
            return Err(RagError::ConfigError(format!(
                "embedding service produces {} dimensions, config declares {}",
                embeddings.dimensions(),
                config.embedding.dense_dimensions
            )));
        }

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => chunking::build_chunker(&config.chunking)?,
        };
        let hybrid =
            BatchIngestor::from_config(Arc::clone(&store), &config, CollectionKind::Hybrid);
        let dense = BatchIngestor::from_config(store, &config, CollectionKind::Dense);

        Ok(IngestionPipeline { config, embeddings, chunker, hybrid, dense })
    }
}
