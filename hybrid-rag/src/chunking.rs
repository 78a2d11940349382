//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and four implementations:
//!
//! - [`CharacterChunker`]: fixed character window with overlap
//! - [`TokenChunker`]: fixed token window with overlap, for a model's tokenizer
//! - [`SentenceChunker`]: groups of consecutive sentences
//! - [`RecursiveChunker`]: whole paragraphs when they fit, token windows otherwise
//!
//! Strategies only produce text. [`chunk_document`] attaches identity
//! (hash, id, sequence) and the parent document's metadata.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{ChunkingConfig, ChunkingStrategy};
use crate::document::{Chunk, RawDocument};
use crate::error::{RagError, Result};
use crate::identity;
use crate::tokenizer::{TiktokenTokenizer, Tokenizer};

/// A strategy for splitting text into chunks.
///
/// Implementations return non-empty chunks in document order, and an empty
/// `Vec` for empty input.
pub trait Chunker: Send + Sync {
    /// Split text into chunk texts.
    fn split(&self, text: &str) -> Result<Vec<String>>;

    /// Short strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Sliding windows of `size` units advancing by `size - overlap`.
///
/// Stops at the first window that reaches `len`, so the window count is
/// `ceil((len - overlap) / (size - overlap))` for `len > size` and 1 for
/// `0 < len <= size`.
fn window_ranges(len: usize, size: usize, overlap: usize) -> Vec<Range<usize>> {
    let step = size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + size).min(len);
        windows.push(start..end);
        if end == len {
            break;
        }
        start += step;
    }
    windows
}

fn check_window(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Splits text into fixed-size windows of characters with overlap.
///
/// Sizes count Unicode scalar values, not bytes, so multi-byte text is never
/// cut inside a character. The last chunk may be shorter than `chunk_size`.
#[derive(Debug, Clone)]
pub struct CharacterChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CharacterChunker {
    /// Create a new `CharacterChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_window(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for CharacterChunker {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        let chars: Vec<char> = text.chars().collect();
        Ok(window_ranges(chars.len(), self.chunk_size, self.chunk_overlap)
            .into_iter()
            .map(|range| chars[range].iter().collect())
            .collect())
    }

    fn name(&self) -> &'static str {
        "character"
    }
}

/// Splits text into fixed-size windows of model tokens with overlap.
///
/// Each window is decoded back to text, so every chunk fits the token budget
/// of the model the tokenizer belongs to.
#[derive(Clone)]
pub struct TokenChunker {
    tokenizer: Arc<dyn Tokenizer>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TokenChunker {
    /// Create a new `TokenChunker` over the given tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `chunk_overlap < chunk_size`.
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self> {
        check_window(chunk_size, chunk_overlap)?;
        Ok(Self { tokenizer, chunk_size, chunk_overlap })
    }

    /// Create a `TokenChunker` using the tokenizer for `model`.
    pub fn for_model(model: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::new(Arc::new(TiktokenTokenizer::for_model(model)?), chunk_size, chunk_overlap)
    }

    /// The token budget per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of tokens in `text`.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.count(text)
    }
}

impl Chunker for TokenChunker {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        let tokens = self.tokenizer.encode(text);
        window_ranges(tokens.len(), self.chunk_size, self.chunk_overlap)
            .into_iter()
            .map(|range| self.tokenizer.decode(&tokens[range]))
            .filter(|decoded| !matches!(decoded, Ok(s) if s.is_empty()))
            .collect()
    }

    fn name(&self) -> &'static str {
        "token"
    }
}

/// Groups every `max_sentences` consecutive sentences into one chunk.
///
/// Sentences come from Unicode sentence boundaries, so chunk boundaries never
/// fall mid-sentence. Sentences are trimmed and joined with a single space;
/// groups do not overlap.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    max_sentences: usize,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `max_sentences` is zero.
    pub fn new(max_sentences: usize) -> Result<Self> {
        if max_sentences == 0 {
            return Err(RagError::ConfigError("max_sentences must be greater than zero".into()));
        }
        Ok(Self { max_sentences })
    }
}

impl Chunker for SentenceChunker {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        let sentences: Vec<&str> =
            text.split_sentence_bounds().map(str::trim).filter(|s| !s.is_empty()).collect();
        Ok(sentences.chunks(self.max_sentences).map(|group| group.join(" ")).collect())
    }

    fn name(&self) -> &'static str {
        "sentence"
    }
}

/// Splits on blank-line paragraph boundaries, then token-windows oversized paragraphs.
///
/// A trimmed paragraph whose token count is at most the budget becomes one
/// chunk verbatim; a larger one is split with the inner [`TokenChunker`].
#[derive(Clone)]
pub struct RecursiveChunker {
    token_chunker: TokenChunker,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` around a token chunker.
    pub fn new(token_chunker: TokenChunker) -> Self {
        Self { token_chunker }
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        let mut chunks = Vec::new();
        for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if self.token_chunker.count_tokens(paragraph) <= self.token_chunker.chunk_size() {
                chunks.push(paragraph.to_string());
            } else {
                chunks.extend(self.token_chunker.split(paragraph)?);
            }
        }
        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "recursive"
    }
}

/// Build the chunker selected by `config`.
pub fn build_chunker(config: &ChunkingConfig) -> Result<Arc<dyn Chunker>> {
    let chunker: Arc<dyn Chunker> = match config.strategy {
        ChunkingStrategy::Character => {
            Arc::new(CharacterChunker::new(config.chunk_size, config.chunk_overlap)?)
        }
        ChunkingStrategy::Token => Arc::new(TokenChunker::for_model(
            &config.tokenizer_model,
            config.chunk_size,
            config.chunk_overlap,
        )?),
        ChunkingStrategy::Sentence => Arc::new(SentenceChunker::new(config.max_sentences)?),
        ChunkingStrategy::Recursive => Arc::new(RecursiveChunker::new(TokenChunker::for_model(
            &config.tokenizer_model,
            config.chunk_size,
            config.chunk_overlap,
        )?)),
    };
    Ok(chunker)
}

/// Split one document and attach chunk identity and metadata.
///
/// Windows that hold only whitespace are skipped before numbering, since they
/// carry no content and would all share the hash of the empty string. A
/// blank document yields no chunks.
pub fn chunk_document(chunker: &dyn Chunker, document: &RawDocument) -> Result<Vec<Chunk>> {
    if identity::is_blank(&document.text) {
        return Ok(Vec::new());
    }

    let texts = chunker.split(&document.text).map_err(|e| {
        RagError::ChunkingError(format!("failed to split row {}: {e}", document.row_id))
    })?;
    let metadata = document.chunk_metadata();

    let chunks: Vec<Chunk> = texts
        .into_iter()
        .filter(|text| !identity::is_blank(text))
        .enumerate()
        .map(|(sequence, chunk_text)| {
            let chunk_hash = identity::chunk_hash(&chunk_text);
            Chunk {
                chunk_id: identity::chunk_id(document.row_id, sequence, &chunk_hash),
                chunk_text,
                chunk_hash,
                source_row_id: document.row_id,
                sequence,
                metadata: metadata.clone(),
            }
        })
        .collect();

    debug!(
        row_id = document.row_id,
        strategy = chunker.name(),
        chunk_count = chunks.len(),
        "chunked document"
    );
    Ok(chunks)
}

/// Chunk many documents, preserving document order.
pub fn chunk_documents(chunker: &dyn Chunker, documents: &[RawDocument]) -> Result<Vec<Chunk>> {
    let mut all = Vec::new();
    for document in documents {
        all.extend(chunk_document(chunker, document)?);
    }
    Ok(all)
}
