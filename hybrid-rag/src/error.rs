//! The crate-wide error type.

use thiserror::Error;

/// Failures from any stage of ingestion or retrieval.
///
/// Variants that originate in a pluggable component name it (`provider`,
/// `backend`, `model`) so a log line identifies which implementation failed.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid settings, an unknown model, or a disabled feature.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// The CSV source could not be opened or parsed.
    #[error("cannot load {path}: {message}")]
    LoaderError {
        /// The file that was being read.
        path: String,
        /// What went wrong, from the I/O or CSV layer.
        message: String,
    },

    /// Bad chunk window parameters or a splitter failure.
    #[error("chunking failed: {0}")]
    ChunkingError(String),

    /// No tokenizer could be built, or it failed to encode or decode.
    #[error("tokenizer for {model}: {message}")]
    TokenizerError {
        /// The model whose tokenizer was requested.
        model: String,
        /// The tokenizer's own error text.
        message: String,
    },

    /// A dense or sparse encoder failed or returned malformed output.
    #[error("{provider} embedding failed: {message}")]
    EmbeddingError {
        /// Which encoder failed, such as `openai`, `fastembed` or `sparse`.
        provider: String,
        /// The provider's error, or a description of the malformed output.
        message: String,
    },

    /// A chunk was rejected before being written to `collection`: a missing
    /// dense vector, a malformed sparse vector, or a dimension mismatch.
    #[error("cannot ingest into {collection}: {message}")]
    IngestionError {
        /// The collection the batch was bound for.
        collection: String,
        /// Which chunk was rejected and why.
        message: String,
    },

    /// The vector store refused a request or could not be reached.
    #[error("{backend} vector store: {message}")]
    VectorStoreError {
        /// `qdrant` or `InMemory`.
        backend: String,
        /// The backend's error text.
        message: String,
    },

    /// A pipeline stage failed; the message carries the stage and its cause.
    #[error("pipeline: {0}")]
    PipelineError(String),
}

/// Shorthand for results carrying a [`RagError`].
pub type Result<T> = std::result::Result<T, RagError>;
