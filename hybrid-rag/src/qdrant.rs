//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//! Collections use named vectors: [`DENSE_VECTOR`] with cosine distance and,
//! for hybrid collections, [`SPARSE_VECTOR`] with the IDF modifier so the
//! server completes the BM25 weighting at query time.
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334")?;
//! store.create_collection("articles_dense_collection", &CollectionKind::Dense.schema(384)).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, Modifier, NamedVectors, PointStruct,
    Query, QueryPointsBuilder, SparseVectorParamsBuilder, SparseVectorsConfigBuilder,
    UpsertPointsBuilder, Value as QdrantValue, Vector, VectorInput, VectorParamsBuilder,
    VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::document::SparseVector;
use crate::error::{RagError, Result};
use crate::vectorstore::{
    CollectionSchema, DENSE_VECTOR, SPARSE_VECTOR, ScoredPoint, UpsertOptions, VectorPoint,
    VectorStore,
};

/// Points per upsert request.
const UPSERT_CHUNK_SIZE: usize = 256;

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStoreError { backend: "qdrant".to_string(), message: e.to_string() }
    }

    fn to_point(point: VectorPoint) -> Result<PointStruct> {
        let mut vectors =
            NamedVectors::default().add_vector(DENSE_VECTOR, Vector::new_dense(point.dense));
        if let Some(sparse) = point.sparse {
            vectors = vectors
                .add_vector(SPARSE_VECTOR, Vector::new_sparse(sparse.indices, sparse.values));
        }
        let payload = Payload::try_from(Value::Object(point.payload)).map_err(Self::map_err)?;
        Ok(PointStruct::new(point.id, vectors, payload))
    }

    fn to_scored(point: qdrant_client::qdrant::ScoredPoint) -> ScoredPoint {
        let id = point
            .id
            .and_then(|pid| match pid.point_id_options {
                Some(PointIdOptions::Uuid(s)) => Some(s),
                Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                None => None,
            })
            .unwrap_or_default();
        ScoredPoint { id, score: point.score, payload: payload_to_json(point.payload) }
    }

    async fn query(&self, builder: QueryPointsBuilder) -> Result<Vec<ScoredPoint>> {
        let response = self.client.query(builder).await.map_err(Self::map_err)?;
        Ok(response.result.into_iter().map(Self::to_scored).collect())
    }
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload.into_iter().map(|(k, v)| (k, value_to_json(v))).collect()
}

fn value_to_json(value: QdrantValue) -> Value {
    match value.kind {
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(d)) => {
            serde_json::Number::from_f64(d).map_or(Value::Null, Value::Number)
        }
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::StructValue(s)) => Value::Object(payload_to_json(s.fields)),
        Some(Kind::ListValue(l)) => Value::Array(l.values.into_iter().map(value_to_json).collect()),
        Some(Kind::NullValue(_)) | None => Value::Null,
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client.collection_exists(name).await.map_err(Self::map_err)
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<bool> {
        if self.collection_exists(name).await? {
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return Ok(false);
        }

        let mut vectors = VectorsConfigBuilder::default();
        vectors.add_named_vector_params(
            DENSE_VECTOR,
            VectorParamsBuilder::new(schema.dense_dimensions as u64, Distance::Cosine),
        );
        let mut builder = CreateCollectionBuilder::new(name).vectors_config(vectors);
        if schema.sparse {
            let mut sparse = SparseVectorsConfigBuilder::default();
            sparse.add_named_vector_params(
                SPARSE_VECTOR,
                SparseVectorParamsBuilder::default().modifier(Modifier::Idf),
            );
            builder = builder.sparse_vectors_config(sparse);
        }

        self.client.create_collection(builder).await.map_err(Self::map_err)?;
        info!(
            collection = name,
            dimensions = schema.dense_dimensions,
            sparse = schema.sparse,
            "created qdrant collection"
        );
        Ok(true)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(Self::map_err)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.map_or(0, |r| r.count as usize))
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
        options: &UpsertOptions,
    ) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let total = points.len();
        let points = points.into_iter().map(Self::to_point).collect::<Result<Vec<_>>>()?;
        // Each request commits on its own; a failure leaves earlier ones applied.
        let batches: Vec<Vec<PointStruct>> =
            points.chunks(UPSERT_CHUNK_SIZE).map(<[PointStruct]>::to_vec).collect();

        futures::stream::iter(batches)
            .map(|batch| {
                let builder = UpsertPointsBuilder::new(collection, batch).wait(options.wait);
                async move { self.client.upsert_points(builder).await.map_err(Self::map_err) }
            })
            .buffer_unordered(options.parallelism.max(1))
            .try_collect::<Vec<_>>()
            .await?;

        debug!(collection, count = total, "upserted points to qdrant");
        Ok(())
    }

    async fn search_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut builder = QueryPointsBuilder::new(collection)
            .query(Query::new_nearest(vector.to_vec()))
            .using(DENSE_VECTOR)
            .limit(limit as u64)
            .with_payload(true);
        if let Some(threshold) = score_threshold {
            builder = builder.score_threshold(threshold);
        }
        self.query(builder).await
    }

    async fn search_sparse(
        &self,
        collection: &str,
        vector: &SparseVector,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let input = VectorInput::new_sparse(vector.indices.clone(), vector.values.clone());
        let builder = QueryPointsBuilder::new(collection)
            .query(Query::new_nearest(input))
            .using(SPARSE_VECTOR)
            .limit(limit as u64)
            .with_payload(true);
        self.query(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_payload_values_convert_to_json() {
        let payload: Payload = Payload::try_from(serde_json::json!({
            "title": "Metaphors",
            "source_row_id": 4,
            "tags": ["a", "b"],
            "author": null,
        }))
        .unwrap();
        let json = payload_to_json(payload.into());
        assert_eq!(json["title"], serde_json::json!("Metaphors"));
        assert_eq!(json["source_row_id"], serde_json::json!(4));
        assert_eq!(json["tags"], serde_json::json!(["a", "b"]));
        assert_eq!(json["author"], Value::Null);
    }
}
