//! Hybrid dense + sparse retrieval for retrieval-augmented generation.
//!
//! This crate provides:
//! - Chunking strategies (character, token, sentence, paragraph-aware) with
//!   content-addressed chunk identity
//! - Dense embedding providers and a native BM25 sparse encoder
//! - Ingestion into a dense-only and a hybrid (dense + `bm25`) collection
//!   with deterministic point ids
//! - Dense search, hybrid search fused with Reciprocal Rank Fusion, and a
//!   runner that merges both collections' results
//!
//! # Feature flags
//!
//! | Feature     | Enables                                   |
//! |-------------|-------------------------------------------|
//! | `qdrant`    | [`qdrant::QdrantVectorStore`]             |
//! | `openai`    | [`openai::OpenAIEmbeddingProvider`]       |
//! | `fastembed` | [`fastembed::FastEmbedProvider`]          |
//! | `full`      | all of the above                          |

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod identity;
pub mod inmemory;
pub mod ingestion;
pub mod loader;
pub mod pipeline;
pub mod retrieval;
pub mod runner;
pub mod sparse;
pub mod tokenizer;
pub mod vectorstore;

#[cfg(feature = "fastembed")]
pub mod fastembed;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{
    CharacterChunker, Chunker, RecursiveChunker, SentenceChunker, TokenChunker, build_chunker,
    chunk_document, chunk_documents,
};
pub use config::{
    ChunkingConfig, ChunkingStrategy, EmbeddingConfig, EmbeddingProviderKind, MergeStrategy,
    PointIdStrategy, RagConfig, RagConfigBuilder, RetrievalConfig, StoreConfig,
};
pub use document::{
    Chunk, ChunkMetadata, EmbeddedChunk, RawDocument, RetrievalMatch, SCHEMA_VERSION,
    SparseVector,
};
pub use embedding::{
    EmbeddingProvider, EmbeddingService, QueryEmbedding, SparseEmbeddingProvider,
    dense_provider_from_config,
};
pub use error::{RagError, Result};
pub use fusion::{merge_ranked, min_max_normalize, reciprocal_rank_fusion};
pub use inmemory::InMemoryVectorStore;
pub use ingestion::BatchIngestor;
pub use loader::CsvLoader;
pub use pipeline::{IngestionPipeline, IngestionPipelineBuilder, IngestionReport};
pub use retrieval::{DenseRetrievalService, HybridRetrievalService};
pub use runner::RetrievalRunner;
pub use sparse::Bm25Encoder;
pub use tokenizer::{TiktokenTokenizer, Tokenizer};
pub use vectorstore::{
    CollectionKind, CollectionSchema, ScoredPoint, UpsertOptions, VectorPoint, VectorStore,
};
