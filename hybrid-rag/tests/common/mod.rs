//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use hybrid_rag::identity;
use hybrid_rag::{
    Bm25Encoder, ChunkingStrategy, EmbeddingProvider, EmbeddingService, RagConfig,
};

pub const DIM: usize = 16;

/// Deterministic embedder: a unit vector drawn from a SplitMix64 stream
/// seeded by the FNV-1a hash of the normalized text.
///
/// Texts that normalize equally embed identically (cosine 1.0); unrelated
/// texts get near-orthogonal vectors.
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes()
        .fold(0xcbf2_9ce4_8422_2325, |acc, b| (acc ^ u64::from(b)).wrapping_mul(0x100_0000_01b3))
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

pub fn mock_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let mut state = fnv1a(&identity::normalize(text));
    let mut emb: Vec<f32> = (0..dimensions)
        .map(|_| (splitmix64(&mut state) >> 40) as f32 / (1u64 << 23) as f32 - 1.0)
        .collect();
    let norm = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        emb.iter_mut().for_each(|x| *x /= norm);
    }
    emb
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> hybrid_rag::Result<Vec<f32>> {
        Ok(mock_vector(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embedding service with the mock dense model and the BM25 encoder.
pub fn embedding_service() -> Arc<EmbeddingService> {
    Arc::new(
        EmbeddingService::new(
            Arc::new(MockEmbeddingProvider::new(DIM)),
            Some(Arc::new(Bm25Encoder::new())),
            DIM,
            8,
        )
        .unwrap(),
    )
}

/// Character chunking, 1000 / 200, mock dimensions.
pub fn character_config() -> RagConfig {
    RagConfig::builder()
        .chunking_strategy(ChunkingStrategy::Character)
        .chunk_size(1000)
        .chunk_overlap(200)
        .dense_dimensions(DIM)
        .build()
        .unwrap()
}

/// Distinct space-separated terms, cut to exactly `len` characters.
pub fn distinct_text(len: usize) -> String {
    let mut text = String::new();
    let mut i = 0;
    while text.len() < len {
        text.push_str(&format!("term{i} "));
        i += 1;
    }
    text.truncate(len);
    text
}

/// Write an articles CSV with the given `(title, text)` rows.
pub fn articles_csv(rows: &[(&str, &str)]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "title,author,link,text").unwrap();
    for (title, text) in rows {
        writeln!(file, "{title},Lakoff,https://example.com/{title},{text}").unwrap();
    }
    file.flush().unwrap();
    file
}
