//! In-memory vector store with dense cosine and sparse dot-product search.
//!
//! [`InMemoryVectorStore`] keeps every collection in a `HashMap` behind a
//! `tokio::sync::RwLock`. It enforces the same schema rules as a real store
//! (dense size, sparse field presence) so pipelines can be tested end to end
//! without a server.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::SparseVector;
use crate::error::{RagError, Result};
use crate::vectorstore::{
    CollectionSchema, ScoredPoint, UpsertOptions, VectorPoint, VectorStore,
};

#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    points: HashMap<String, VectorPoint>,
}

/// An in-memory [`VectorStore`].
///
/// Sparse scores are raw dot products; the IDF weighting a server applies to
/// the sparse field is not reproduced.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema a collection was created with, if it exists.
    pub async fn schema(&self, name: &str) -> Option<CollectionSchema> {
        self.collections.read().await.get(name).map(|c| c.schema)
    }

    /// Fetch a stored point by id.
    pub async fn get(&self, collection: &str, id: &str) -> Option<VectorPoint> {
        self.collections.read().await.get(collection).and_then(|c| c.points.get(id).cloned())
    }

    fn missing(collection: &str) -> RagError {
        store_error(format!("collection '{collection}' does not exist"))
    }
}

fn store_error(message: String) -> RagError {
    RagError::VectorStoreError { backend: "InMemory".to_string(), message }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn ranked(mut hits: Vec<ScoredPoint>, limit: usize) -> Vec<ScoredPoint> {
    hits.sort_by(|a, b| {
        b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(limit);
    hits
}

fn check_point(schema: &CollectionSchema, point: &VectorPoint) -> Result<()> {
    if point.dense.len() != schema.dense_dimensions {
        return Err(store_error(format!(
            "point {} has a {}-dimensional dense vector, collection expects {}",
            point.id,
            point.dense.len(),
            schema.dense_dimensions
        )));
    }
    match (&point.sparse, schema.sparse) {
        (Some(_), false) => Err(store_error(format!(
            "point {} carries a sparse vector but the collection has no sparse field",
            point.id
        ))),
        (Some(sparse), true) => sparse.validate(),
        (None, _) => Ok(()),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<bool> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Ok(false);
        }
        collections
            .insert(name.to_string(), Collection { schema: *schema, points: HashMap::new() });
        debug!(
            collection = name,
            dimensions = schema.dense_dimensions,
            sparse = schema.sparse,
            "created collection"
        );
        Ok(true)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.points.len()).ok_or_else(|| Self::missing(collection))
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
        _options: &UpsertOptions,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;

        // Validate the whole batch first so a rejected point leaves the collection untouched.
        for point in &points {
            check_point(&target.schema, point)?;
        }
        for point in points {
            target.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn search_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let target = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        if vector.len() != target.schema.dense_dimensions {
            return Err(store_error(format!(
                "query has {} dimensions, collection expects {}",
                vector.len(),
                target.schema.dense_dimensions
            )));
        }

        let hits = target
            .points
            .values()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine_similarity(&p.dense, vector),
                payload: p.payload.clone(),
            })
            .filter(|hit| score_threshold.is_none_or(|t| hit.score >= t))
            .collect();
        Ok(ranked(hits, limit))
    }

    async fn search_sparse(
        &self,
        collection: &str,
        vector: &SparseVector,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let target = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        if !target.schema.sparse {
            return Err(store_error(format!("collection '{collection}' has no sparse field")));
        }

        let hits = target
            .points
            .values()
            .filter_map(|p| {
                let score = p.sparse.as_ref()?.dot(vector);
                (score > 0.0).then(|| ScoredPoint {
                    id: p.id.clone(),
                    score,
                    payload: p.payload.clone(),
                })
            })
            .collect();
        Ok(ranked(hits, limit))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::vectorstore::CollectionKind;

    fn point(id: &str, dense: Vec<f32>, sparse: Option<SparseVector>) -> VectorPoint {
        VectorPoint { id: id.into(), dense, sparse, payload: Map::new() }
    }

    #[tokio::test]
    async fn create_is_idempotent_and_reports_creation() {
        let store = InMemoryVectorStore::new();
        let schema = CollectionKind::Dense.schema(2);
        assert!(store.create_collection("c", &schema).await.unwrap());
        assert!(!store.create_collection("c", &schema).await.unwrap());
        assert!(store.collection_exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn dense_collection_rejects_sparse_and_wrong_size() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", &CollectionKind::Dense.schema(2)).await.unwrap();
        let opts = UpsertOptions::default();

        let sparse = Some(SparseVector::new(vec![1], vec![1.0]).unwrap());
        assert!(store.upsert("c", vec![point("a", vec![1.0, 0.0], sparse)], &opts).await.is_err());
        assert!(store.upsert("c", vec![point("a", vec![1.0], None)], &opts).await.is_err());
        assert_eq!(store.count("c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn threshold_applies_before_limit() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", &CollectionKind::Dense.schema(2)).await.unwrap();
        let points = vec![point("a", vec![1.0, 0.0], None), point("b", vec![0.0, 1.0], None)];
        store.upsert("c", points, &UpsertOptions::default()).await.unwrap();

        let hits = store.search_dense("c", &[1.0, 0.1], 10, Some(0.5)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn sparse_search_only_returns_overlapping_points() {
        let store = InMemoryVectorStore::new();
        store.create_collection("h", &CollectionKind::Hybrid.schema(1)).await.unwrap();
        let points = vec![
            point("a", vec![1.0], Some(SparseVector::new(vec![1, 2], vec![0.5, 0.5]).unwrap())),
            point("b", vec![1.0], Some(SparseVector::new(vec![3], vec![0.9]).unwrap())),
        ];
        store.upsert("h", points, &UpsertOptions::default()).await.unwrap();

        let query = SparseVector::new(vec![2], vec![1.0]).unwrap();
        let hits = store.search_sparse("h", &query, 10).await.unwrap();
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
    }
}
