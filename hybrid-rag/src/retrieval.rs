//! Similarity search over one collection: dense-only, or dense plus sparse fused with RRF.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::RagConfig;
use crate::document::{RetrievalMatch, SparseVector};
use crate::error::Result;
use crate::fusion::reciprocal_rank_fusion;
use crate::vectorstore::{ScoredPoint, VectorStore};

fn to_matches(points: Vec<ScoredPoint>) -> Vec<RetrievalMatch> {
    points.into_iter().map(|p| RetrievalMatch::from_payload(p.id, p.score, p.payload)).collect()
}

/// Nearest-neighbour search on the dense field of a collection.
pub struct DenseRetrievalService {
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl DenseRetrievalService {
    /// Create a service over `collection`.
    pub fn new(store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self { store, collection: collection.into() }
    }

    /// Create the service for the configured dense-only collection.
    pub fn from_config(store: Arc<dyn VectorStore>, config: &RagConfig) -> Self {
        Self::new(store, config.store.dense_collection())
    }

    /// The collection searched.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Return at most `k` matches scoring at least `score_threshold`, best first.
    ///
    /// No match above the threshold is an empty result, not an error.
    pub async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievalMatch>> {
        let points = self
            .store
            .search_dense(&self.collection, query_vector, k, Some(score_threshold))
            .await
            .map_err(|e| {
                error!(collection = %self.collection, error = %e, "dense search failed");
                e
            })?;
        let matches = to_matches(points);
        debug!(collection = %self.collection, count = matches.len(), "dense search");
        Ok(matches)
    }
}

/// Dense and sparse sub-queries on a hybrid collection, fused client-side with RRF.
pub struct HybridRetrievalService {
    store: Arc<dyn VectorStore>,
    collection: String,
    rank_constant: f32,
    score_threshold: f32,
}

impl HybridRetrievalService {
    /// Create a service over `collection` with the given RRF constant and post-fusion threshold.
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        rank_constant: f32,
        score_threshold: f32,
    ) -> Self {
        Self { store, collection: collection.into(), rank_constant, score_threshold }
    }

    /// Create the service for the configured hybrid collection.
    pub fn from_config(store: Arc<dyn VectorStore>, config: &RagConfig) -> Self {
        Self::new(
            store,
            config.store.hybrid_collection(),
            config.retrieval.rank_constant,
            config.retrieval.fused_score_threshold,
        )
    }

    /// The collection searched.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Fuse the top `dense_limit` dense hits and top `sparse_limit` sparse hits.
    ///
    /// The fused list is truncated to `k` and then filtered by the post-fusion
    /// threshold. A query with no salient terms skips the sparse sub-query.
    pub async fn similarity_search(
        &self,
        query_dense: &[f32],
        query_sparse: &SparseVector,
        k: usize,
        dense_limit: usize,
        sparse_limit: usize,
    ) -> Result<Vec<RetrievalMatch>> {
        let dense = self.store.search_dense(&self.collection, query_dense, dense_limit, None);
        let dense = dense.await.map_err(|e| {
            error!(collection = %self.collection, error = %e, "hybrid dense sub-query failed");
            e
        })?;

        let sparse = if query_sparse.is_empty() {
            warn!(collection = %self.collection, "query has no sparse terms, using dense only");
            Vec::new()
        } else {
            self.store
                .search_sparse(&self.collection, query_sparse, sparse_limit)
                .await
                .map_err(|e| {
                    error!(collection = %self.collection, error = %e, "sparse sub-query failed");
                    e
                })?
        };

        debug!(
            collection = %self.collection,
            dense_count = dense.len(),
            sparse_count = sparse.len(),
            "hybrid sub-queries"
        );

        let mut fused =
            reciprocal_rank_fusion(&[to_matches(dense), to_matches(sparse)], self.rank_constant);
        fused.truncate(k);
        fused.retain(|m| m.score >= self.score_threshold);
        Ok(fused)
    }
}
