//! BM25 sparse encoder producing the same term space as the `Qdrant/bm25` model.
//!
//! Text is lower-cased and split on non-word characters. English stop words
//! and tokens over 40 characters are dropped, and the rest are reduced with
//! the Snowball English stemmer. Each stem is hashed with 32-bit MurmurHash3
//! (seed 0) and the absolute value of the signed hash is the term index, so
//! vectors line up with points written by fastembed's `Bm25` model.
//!
//! Documents carry the term-frequency half of BM25. The inverse document
//! frequency half is applied by the store, whose sparse field is declared
//! with an IDF modifier. Queries give each distinct term weight 1.0.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use rust_stemmers::{Algorithm, Stemmer};

use crate::document::SparseVector;
use crate::embedding::SparseEmbeddingProvider;
use crate::error::{RagError, Result};

/// The only sparse model name this encoder answers to.
pub const BM25_MODEL: &str = "Qdrant/bm25";

const TOKEN_MAX_CHARS: usize = 40;

const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Term index of a stem: `|murmur3_32(stem, 0)|` read as a signed 32-bit value.
fn term_index(stem: &str) -> Result<u32> {
    let hash = murmur3::murmur3_32(&mut stem.as_bytes(), 0).map_err(|e| {
        RagError::EmbeddingError { provider: BM25_MODEL.to_string(), message: e.to_string() }
    })?;
    Ok((hash as i32).unsigned_abs())
}

/// Encodes text into BM25 term-weight sparse vectors.
pub struct Bm25Encoder {
    k1: f32,
    b: f32,
    avg_len: f32,
    stopwords: HashSet<&'static str>,
    stemmer: Stemmer,
}

impl fmt::Debug for Bm25Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bm25Encoder")
            .field("k1", &self.k1)
            .field("b", &self.b)
            .field("avg_len", &self.avg_len)
            .finish_non_exhaustive()
    }
}

impl Default for Bm25Encoder {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            avg_len: 256.0,
            stopwords: ENGLISH_STOPWORDS.iter().copied().collect(),
            stemmer: Stemmer::create(Algorithm::English),
        }
    }
}

impl Bm25Encoder {
    /// Create an encoder with the `Qdrant/bm25` defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the encoder for a configured sparse model name.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for any model other than [`BM25_MODEL`].
    pub fn for_model(model: &str) -> Result<Self> {
        if model != BM25_MODEL {
            return Err(RagError::ConfigError(format!(
                "unsupported sparse model '{model}', expected '{BM25_MODEL}'"
            )));
        }
        Ok(Self::new())
    }

    /// Override the BM25 saturation (`k1`) and length normalization (`b`) parameters.
    pub fn with_params(mut self, k1: f32, b: f32, avg_len: f32) -> Self {
        self.k1 = k1;
        self.b = b;
        self.avg_len = avg_len;
        self
    }

    /// Stems of the salient words of `text`, in order.
    pub fn stems(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !is_word_char(c))
            // `_` is a word character but also punctuation on its own.
            .filter(|token| !token.is_empty() && *token != "_")
            .filter(|token| !self.stopwords.contains(*token))
            .filter(|token| token.chars().count() <= TOKEN_MAX_CHARS)
            .map(|token| self.stemmer.stem(token).into_owned())
            .filter(|stem| !stem.is_empty())
            .collect()
    }

    /// Count term occurrences by index. Hash collisions merge their counts.
    fn term_frequencies(&self, text: &str) -> Result<(BTreeMap<u32, f32>, usize)> {
        let stems = self.stems(text);
        let mut tf = BTreeMap::new();
        for stem in &stems {
            *tf.entry(term_index(stem)?).or_insert(0.0) += 1.0;
        }
        Ok((tf, stems.len()))
    }

    /// Encode a document. Empty or all-stop-word text gives an empty vector.
    pub fn encode_document(&self, text: &str) -> Result<SparseVector> {
        let (tf, doc_len) = self.term_frequencies(text)?;
        let norm = self.k1 * (1.0 - self.b + self.b * doc_len as f32 / self.avg_len);
        let (indices, values) =
            tf.into_iter().map(|(index, f)| (index, f * (self.k1 + 1.0) / (f + norm))).unzip();
        Ok(SparseVector { indices, values })
    }

    /// Encode a query: each distinct term gets weight 1.0.
    pub fn encode_query(&self, text: &str) -> Result<SparseVector> {
        let (tf, _) = self.term_frequencies(text)?;
        let indices: Vec<u32> = tf.into_keys().collect();
        let values = vec![1.0; indices.len()];
        Ok(SparseVector { indices, values })
    }
}

#[async_trait]
impl SparseEmbeddingProvider for Bm25Encoder {
    async fn embed_sparse(&self, text: &str) -> Result<SparseVector> {
        self.encode_document(text)
    }

    async fn embed_sparse_query(&self, text: &str) -> Result<SparseVector> {
        self.encode_query(text)
    }

    fn model_name(&self) -> &str {
        BM25_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_and_punctuation_are_dropped() {
        let encoder = Bm25Encoder::new();
        assert!(encoder.encode_document("the, and; of! _ don't").unwrap().is_empty());
        assert!(encoder.encode_document("").unwrap().is_empty());
    }

    #[test]
    fn inflections_share_a_stem() {
        let encoder = Bm25Encoder::new();
        let stems = encoder.stems("Arguments argued about METAPHORS");
        assert_eq!(stems, ["argument", "argu", "metaphor"]);

        let query = encoder.encode_query("argument metaphor").unwrap();
        let doc = encoder.encode_document("Arguments shaped how people argued about metaphors");
        assert!(query.dot(&doc.unwrap()) > 0.0);
    }

    #[test]
    fn term_ids_are_absolute_signed_murmur3() {
        let encoder = Bm25Encoder::new();
        // murmur3_32("hello", 0) = 613153351; murmur3_32("foo", 0) = -156908512 as i32.
        assert_eq!(encoder.encode_query("hello").unwrap().indices, vec![613_153_351]);
        assert_eq!(encoder.encode_query("foo").unwrap().indices, vec![156_908_512]);
    }

    #[test]
    fn overlong_tokens_are_skipped() {
        let encoder = Bm25Encoder::new();
        let long = "x".repeat(TOKEN_MAX_CHARS + 1);
        assert!(encoder.stems(&long).is_empty());
        assert_eq!(encoder.stems(&"x".repeat(TOKEN_MAX_CHARS)).len(), 1);
    }

    #[test]
    fn repeated_terms_weigh_more_but_saturate() {
        let encoder = Bm25Encoder::new();
        let once = encoder.encode_document("metaphor").unwrap();
        let thrice = encoder.encode_document("metaphor metaphor metaphor").unwrap();
        assert_eq!(once.indices, thrice.indices);
        assert!(thrice.values[0] > once.values[0]);
        assert!(thrice.values[0] < 3.0 * once.values[0]);
        assert!(thrice.values[0] < 1.2 + 1.0);
    }

    #[test]
    fn indices_are_order_and_case_insensitive() {
        let encoder = Bm25Encoder::new();
        let a = encoder.encode_query("Argument WAR").unwrap();
        let b = encoder.encode_query("war argument").unwrap();
        assert_eq!(a, b);
        assert!(a.values.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn document_and_query_share_term_space() {
        let encoder = Bm25Encoder::new();
        let doc = encoder
            .encode_document("Scammers produce a group of users probabilistically")
            .unwrap();
        let query = encoder.encode_query("group of scammers").unwrap();
        assert!(doc.dot(&query) > 0.0);
        assert_eq!(encoder.encode_query("unrelated botany").unwrap().dot(&doc), 0.0);
    }

    #[test]
    fn only_bm25_model_is_accepted() {
        assert!(Bm25Encoder::for_model(BM25_MODEL).is_ok());
        assert!(Bm25Encoder::for_model("prithivida/Splade_PP_en_v1").is_err());
    }
}
