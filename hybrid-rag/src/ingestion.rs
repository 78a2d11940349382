//! Writing embedded chunks into dense-only and hybrid collections.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::{PointIdStrategy, RagConfig};
use crate::document::EmbeddedChunk;
use crate::error::{RagError, Result};
use crate::identity;
use crate::vectorstore::{CollectionKind, CollectionSchema, UpsertOptions, VectorPoint, VectorStore};

/// Writes [`EmbeddedChunk`]s into one collection.
///
/// The collection kind decides which vectors are written: dense-only
/// collections never receive a sparse field, hybrid collections always
/// receive both vectors of the same chunk.
pub struct BatchIngestor {
    store: Arc<dyn VectorStore>,
    collection: String,
    kind: CollectionKind,
    dimensions: usize,
    point_id: PointIdStrategy,
    options: UpsertOptions,
}

impl BatchIngestor {
    /// Create an ingestor for `collection`.
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        kind: CollectionKind,
        dimensions: usize,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            kind,
            dimensions,
            point_id: PointIdStrategy::default(),
            options: UpsertOptions::default(),
        }
    }

    /// Create the ingestor for the configured collection of `kind`.
    pub fn from_config(
        store: Arc<dyn VectorStore>,
        config: &RagConfig,
        kind: CollectionKind,
    ) -> Self {
        let collection = match kind {
            CollectionKind::Dense => config.store.dense_collection(),
            CollectionKind::Hybrid => config.store.hybrid_collection(),
        };
        Self::new(store, collection, kind, config.embedding.dense_dimensions)
            .with_point_id(config.store.point_id)
            .with_upsert_options(UpsertOptions {
                wait: config.store.wait,
                parallelism: config.store.upload_parallelism,
            })
    }

    /// Choose how point ids are derived.
    pub fn with_point_id(mut self, strategy: PointIdStrategy) -> Self {
        self.point_id = strategy;
        self
    }

    /// Set write acknowledgement and upload parallelism.
    pub fn with_upsert_options(mut self, options: UpsertOptions) -> Self {
        self.options = options;
        self
    }

    /// The target collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The target collection kind.
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// The schema this ingestor creates its collection with.
    pub fn schema(&self) -> CollectionSchema {
        self.kind.schema(self.dimensions)
    }

    /// Create the collection if it does not exist; an existing collection is left untouched.
    ///
    /// Returns whether the collection was created.
    pub async fn create_collection(&self) -> Result<bool> {
        let created =
            self.store.create_collection(&self.collection, &self.schema()).await.map_err(|e| {
                error!(collection = %self.collection, error = %e, "failed to create collection");
                e
            })?;
        if created {
            info!(
                collection = %self.collection,
                kind = ?self.kind,
                dimensions = self.dimensions,
                "created collection"
            );
        } else {
            debug!(collection = %self.collection, "collection already exists");
        }
        Ok(created)
    }

    fn reject(&self, message: String) -> RagError {
        error!(collection = %self.collection, %message, "rejected chunk");
        RagError::IngestionError { collection: self.collection.clone(), message }
    }

    fn to_point(&self, embedded: &EmbeddedChunk) -> Result<VectorPoint> {
        let chunk = &embedded.chunk;
        let dense = embedded
            .dense_vector
            .clone()
            .ok_or_else(|| self.reject(format!("chunk {} has no dense vector", chunk.chunk_id)))?;
        if dense.len() != self.dimensions {
            return Err(self.reject(format!(
                "chunk {} has a {}-dimensional dense vector, collection expects {}",
                chunk.chunk_id,
                dense.len(),
                self.dimensions
            )));
        }

        let sparse = match self.kind {
            CollectionKind::Dense => None,
            CollectionKind::Hybrid => {
                let sparse = embedded.sparse_vector.clone().ok_or_else(|| {
                    self.reject(format!("chunk {} has no sparse vector", chunk.chunk_id))
                })?;
                sparse.validate().map_err(|e| {
                    self.reject(format!(
                        "chunk {} has a malformed sparse vector: {e}",
                        chunk.chunk_id
                    ))
                })?;
                Some(sparse)
            }
        };

        Ok(VectorPoint {
            id: identity::point_id(chunk, self.point_id)?,
            dense,
            sparse,
            payload: chunk.to_payload(),
        })
    }

    /// Validate and write a batch. Returns the number of points written.
    ///
    /// The whole batch is validated before anything is written, so one bad
    /// chunk aborts the batch. Chunks mapping to the same point id collapse
    /// to the last one. An empty batch writes nothing and returns `Ok(0)`.
    pub async fn batch_upsert(&self, chunks: &[EmbeddedChunk]) -> Result<usize> {
        if chunks.is_empty() {
            info!(collection = %self.collection, count = 0, "empty batch, nothing to upsert");
            return Ok(0);
        }

        let mut order: Vec<String> = Vec::with_capacity(chunks.len());
        let mut by_id: HashMap<String, VectorPoint> = HashMap::with_capacity(chunks.len());
        for embedded in chunks {
            let point = self.to_point(embedded)?;
            let id = point.id.clone();
            if by_id.insert(id.clone(), point).is_none() {
                order.push(id);
            }
        }
        let duplicates = chunks.len() - order.len();
        let points: Vec<VectorPoint> =
            order.into_iter().filter_map(|id| by_id.remove(&id)).collect();
        let count = points.len();

        self.store.upsert(&self.collection, points, &self.options).await.map_err(|e| {
            error!(collection = %self.collection, error = %e, "upsert failed");
            e
        })?;

        info!(collection = %self.collection, count, duplicates, "upserted batch");
        Ok(count)
    }
}
