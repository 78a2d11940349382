//! Vector store trait for collections of dense and sparse named vectors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::SparseVector;
use crate::error::Result;

/// Name of the dense vector field in every collection.
pub const DENSE_VECTOR: &str = "dense";

/// Name of the sparse vector field in hybrid collections.
pub const SPARSE_VECTOR: &str = "bm25";

/// The two collection layouts the pipeline writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// A single dense vector per point, cosine distance.
    Dense,
    /// A dense vector plus a sparse BM25 vector per point.
    Hybrid,
}

impl CollectionKind {
    /// Schema of a collection of this kind with the given dense size.
    pub fn schema(self, dense_dimensions: usize) -> CollectionSchema {
        CollectionSchema { dense_dimensions, sparse: self == CollectionKind::Hybrid }
    }
}

/// Named-vector layout of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    /// Size of the [`DENSE_VECTOR`] field.
    pub dense_dimensions: usize,
    /// Whether the collection declares the [`SPARSE_VECTOR`] field (with an IDF modifier).
    pub sparse: bool,
}

/// One point to write.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    /// Deterministic point id (hyphenated UUID).
    pub id: String,
    /// Dense vector, stored under [`DENSE_VECTOR`].
    pub dense: Vec<f32>,
    /// Sparse vector, stored under [`SPARSE_VECTOR`]. Must be `None` for dense collections.
    pub sparse: Option<SparseVector>,
    /// Point payload.
    pub payload: Map<String, Value>,
}

/// One search hit as returned by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    /// Point id.
    pub id: String,
    /// Backend similarity score, higher is more relevant.
    pub score: f32,
    /// Stored payload.
    pub payload: Map<String, Value>,
}

/// Write options for [`VectorStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOptions {
    /// Wait for the write to be applied before returning.
    pub wait: bool,
    /// Number of sub-batches a backend may send concurrently.
    pub parallelism: usize,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self { wait: true, parallelism: 1 }
    }
}

/// A storage backend for named-vector points with similarity search.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::{CollectionKind, InMemoryVectorStore, UpsertOptions, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// let schema = CollectionKind::Hybrid.schema(384);
/// store.create_collection("articles_hybrid_collection", &schema).await?;
/// store.upsert("articles_hybrid_collection", points, &UpsertOptions::default()).await?;
/// let hits = store.search_dense("articles_hybrid_collection", &query, 20, None).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create a collection. Returns `false` without touching it if it already exists.
    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<bool>;

    /// Delete a collection and all its points.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Exact number of points in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Insert or replace points by id.
    ///
    /// Implementations may send large batches as several requests; on error,
    /// requests that already succeeded stay applied.
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
        options: &UpsertOptions,
    ) -> Result<()>;

    /// Nearest neighbours of `vector` on the dense field, by descending score.
    ///
    /// Hits scoring below `score_threshold` are dropped before the limit applies.
    async fn search_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>>;

    /// Best matches of `vector` on the sparse field, by descending score.
    async fn search_sparse(
        &self,
        collection: &str,
        vector: &SparseVector,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;
}
