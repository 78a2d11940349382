//! Query-time orchestration across the dense-only and hybrid collections.

use std::sync::Arc;

use tracing::info;

use crate::config::{RagConfig, RetrievalConfig};
use crate::document::RetrievalMatch;
use crate::embedding::EmbeddingService;
use crate::error::Result;
use crate::fusion::merge_ranked;
use crate::retrieval::{DenseRetrievalService, HybridRetrievalService};
use crate::vectorstore::{CollectionKind, VectorStore};

/// Runs one query against both collections and merges the results.
///
/// # Example
///
/// ```rust,ignore
/// let runner = RetrievalRunner::from_config(embeddings, store, &config);
/// for chunk in runner.retrieve("How are arguments like war?").await? {
///     println!("{:.3} {}", chunk.score, chunk.text);
/// }
/// ```
pub struct RetrievalRunner {
    embeddings: Arc<EmbeddingService>,
    dense: DenseRetrievalService,
    hybrid: HybridRetrievalService,
    config: RetrievalConfig,
}

impl RetrievalRunner {
    /// Create a runner from explicit services.
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        dense: DenseRetrievalService,
        hybrid: HybridRetrievalService,
        config: RetrievalConfig,
    ) -> Self {
        Self { embeddings, dense, hybrid, config }
    }

    /// Create a runner over the configured collections.
    pub fn from_config(
        embeddings: Arc<EmbeddingService>,
        store: Arc<dyn VectorStore>,
        config: &RagConfig,
    ) -> Self {
        Self::new(
            embeddings,
            DenseRetrievalService::from_config(Arc::clone(&store), config),
            HybridRetrievalService::from_config(store, config),
            config.retrieval.clone(),
        )
    }

    /// Embed the query once, search both collections, and return the merged top `final_k`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalMatch>> {
        let query_vectors = self.embeddings.embed_query(query, CollectionKind::Hybrid).await?;
        let sparse = query_vectors.sparse.unwrap_or_default();
        let cfg = &self.config;

        let dense_matches = self
            .dense
            .similarity_search(&query_vectors.dense, cfg.top_k, cfg.score_threshold)
            .await?;
        let hybrid_matches = self
            .hybrid
            .similarity_search(
                &query_vectors.dense,
                &sparse,
                cfg.hybrid_k,
                cfg.dense_limit,
                cfg.sparse_limit,
            )
            .await?;

        let (dense_count, hybrid_count) = (dense_matches.len(), hybrid_matches.len());
        let merged = merge_ranked(
            vec![dense_matches, hybrid_matches],
            cfg.merge_strategy,
            cfg.rank_constant,
            cfg.final_k,
        );
        info!(
            dense_count,
            hybrid_count,
            result_count = merged.len(),
            strategy = ?cfg.merge_strategy,
            "retrieved context"
        );
        Ok(merged)
    }
}
