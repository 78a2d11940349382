//! Dense embeddings from OpenAI-compatible `/embeddings` endpoints.
//!
//! Available with the `openai` feature. Self-hosted servers that speak the same
//! protocol are reached through [`OpenAIEmbeddingProvider::with_base_url`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;

fn provider_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: "openai".to_string(), message: message.into() }
}

/// An [`EmbeddingProvider`] that posts batches to `{base_url}/embeddings`.
///
/// ```rust,ignore
/// use hybrid_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env_var("OPENAI_API_KEY")?
///     .with_base_url("http://localhost:8080/v1")
///     .with_model("sentence-transformers/all-MiniLM-L6-v2")
///     .with_expected_dimensions(384);
/// ```
pub struct OpenAIEmbeddingProvider {
    http: reqwest::Client,
    token: String,
    endpoint: String,
    model: String,
    dims: usize,
    truncate_to: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Provider for `text-embedding-3-small` on the public API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let token = api_key.into();
        if token.trim().is_empty() {
            return Err(provider_error("API key is empty"));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            token,
            endpoint: format!("{OPENAI_BASE_URL}/embeddings"),
            model: DEFAULT_MODEL.to_string(),
            dims: DEFAULT_DIMENSIONS,
            truncate_to: None,
        })
    }

    /// Read the API key from `var`.
    pub fn from_env_var(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(key) => Self::new(key),
            Err(_) => Err(provider_error(format!("environment variable {var} is not set"))),
        }
    }

    /// Use another embedding model. Pair with [`Self::with_expected_dimensions`]
    /// when its output size differs from 1536.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use another server. A trailing `/` is ignored.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        self.endpoint = format!("{}/embeddings", base.trim_end_matches('/'));
        self
    }

    /// Request `dims`-sized vectors from a model that supports shortening.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.truncate_to = Some(dims);
        self.with_expected_dimensions(dims)
    }

    /// Declare the model's native output size. Nothing extra is sent.
    pub fn with_expected_dimensions(mut self, dims: usize) -> Self {
        self.dims = dims;
        self
    }

    async fn post_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut body = json!({ "model": self.model, "input": texts });
        if let Some(dims) = self.truncate_to {
            body["dimensions"] = json!(dims);
        }

        let response =
            self.http.post(&self.endpoint).bearer_auth(&self.token).json(&body).send().await;
        let response = response.map_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "embedding request failed");
            provider_error(format!("request to {} failed: {e}", self.endpoint))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| provider_error(e.to_string()))?;
        if status != StatusCode::OK {
            error!(endpoint = %self.endpoint, %status, "embedding endpoint rejected request");
            return Err(provider_error(format!("{status}: {}", api_message(&text))));
        }

        let reply: Reply = serde_json::from_str(&text)
            .map_err(|e| provider_error(format!("malformed embeddings response: {e}")))?;
        in_input_order(reply.data, texts.len())
    }
}

#[derive(Deserialize)]
struct Reply {
    data: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct Failure {
    error: FailureBody,
}

#[derive(Deserialize)]
struct FailureBody {
    message: String,
}

/// The server's error message, or the raw body if it is not the usual JSON shape.
fn api_message(body: &str) -> String {
    serde_json::from_str::<Failure>(body).map_or_else(|_| body.to_string(), |f| f.error.message)
}

/// Reorder items by `index` and check there is exactly one per input.
fn in_input_order(mut items: Vec<Item>, inputs: usize) -> Result<Vec<Vec<f32>>> {
    if items.len() != inputs {
        return Err(provider_error(format!(
            "{} embeddings returned for {inputs} inputs",
            items.len()
        )));
    }
    items.sort_by_key(|item| item.index);
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.post_embeddings(&[text])
            .await?
            .pop()
            .ok_or_else(|| provider_error("no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, count = texts.len(), "openai embedding batch");
        self.post_embeddings(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_are_returned_in_input_order() {
        let items = vec![
            Item { index: 1, embedding: vec![1.0] },
            Item { index: 0, embedding: vec![0.0] },
        ];
        assert_eq!(in_input_order(items, 2).unwrap(), vec![vec![0.0], vec![1.0]]);
    }

    #[test]
    fn short_reply_is_an_error() {
        let items = vec![Item { index: 0, embedding: vec![0.0] }];
        assert!(in_input_order(items, 2).is_err());
    }

    #[test]
    fn api_message_prefers_error_field() {
        assert_eq!(api_message(r#"{"error":{"message":"bad key"}}"#), "bad key");
        assert_eq!(api_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let provider = OpenAIEmbeddingProvider::new("k").unwrap().with_base_url("http://h/v1/");
        assert_eq!(provider.endpoint, "http://h/v1/embeddings");
        assert!(OpenAIEmbeddingProvider::new("  ").is_err());
    }

    #[test]
    fn model_override_leaves_dimensions_to_the_caller() {
        let provider = OpenAIEmbeddingProvider::new("k").unwrap().with_model("all-MiniLM-L6-v2");
        assert_eq!(provider.model, "all-MiniLM-L6-v2");
        assert_eq!(provider.dimensions(), DEFAULT_DIMENSIONS);

        let provider = provider.with_expected_dimensions(384);
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.truncate_to, None);
    }
}
