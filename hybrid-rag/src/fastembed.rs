//! Local ONNX dense embeddings via the `fastembed` crate.
//!
//! Available with the `fastembed` feature. Models are downloaded on first use
//! into fastembed's cache directory.

use std::sync::Arc;

use async_trait::async_trait;
use ::fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{error, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Map a model name to its fastembed model and output size.
fn resolve(model_name: &str) -> Option<(EmbeddingModel, usize)> {
    match model_name {
        "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => {
            Some((EmbeddingModel::AllMiniLML6V2, 384))
        }
        "BAAI/bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384)),
        "BAAI/bge-base-en-v1.5" => Some((EmbeddingModel::BGEBaseENV15, 768)),
        "BAAI/bge-large-en-v1.5" => Some((EmbeddingModel::BGELargeENV15, 1024)),
        _ => None,
    }
}

fn provider_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: "fastembed".into(), message: message.into() }
}

/// An [`EmbeddingProvider`] running a sentence-transformer model in-process.
///
/// Inference is CPU-bound, so batches run on tokio's blocking pool.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    name: String,
    dims: usize,
}

impl FastEmbedProvider {
    /// Load the named model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for an unknown model name and
    /// [`RagError::EmbeddingError`] if the model cannot be loaded.
    pub fn new(model_name: &str) -> Result<Self> {
        let (model, dims) = resolve(model_name).ok_or_else(|| {
            RagError::ConfigError(format!("unknown fastembed model '{model_name}'"))
        })?;

        let model = TextEmbedding::try_new(InitOptions {
            model_name: model,
            show_download_progress: false,
            ..Default::default()
        })
        .map_err(|e| provider_error(format!("failed to load '{model_name}': {e}")))?;

        info!(model = model_name, dimensions = dims, "loaded fastembed model");
        Ok(Self { model: Arc::new(model), name: model_name.to_string(), dims })
    }

    /// The configured model name.
    pub fn model_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| provider_error("empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        tokio::task::spawn_blocking(move || model.embed(owned, None))
            .await
            .map_err(|e| {
                error!(model = %self.name, error = %e, "fastembed inference task failed");
                provider_error(format!("inference task failed: {e}"))
            })?
            .map_err(|e| provider_error(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
