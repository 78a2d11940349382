//! Model-specific tokenization for token-budgeted chunking.

use tiktoken_rs::CoreBPE;

use crate::error::{RagError, Result};

/// Encodes text to token ids and decodes token windows back to text.
pub trait Tokenizer: Send + Sync {
    /// Encode text to token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode a token window back to text.
    fn decode(&self, tokens: &[u32]) -> Result<String>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// A BPE tokenizer from `tiktoken-rs`, resolved by model name.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
    model: String,
}

impl TiktokenTokenizer {
    /// Resolve the tokenizer used by `model` (e.g. `gpt-4o-mini`).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::TokenizerError`] if the model name is unknown.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| RagError::TokenizerError {
            model: model.to_string(),
            message: format!("no tokenizer for model: {e}"),
        })?;
        Ok(Self { bpe, model: model.to_string() })
    }

    /// The model this tokenizer was resolved for.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer").field("model", &self.model).finish_non_exhaustive()
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_with_special_tokens(text)
    }

    /// Window edges can split a multi-byte character; the partial bytes are
    /// replaced with U+FFFD instead of failing the whole document.
    fn decode(&self, tokens: &[u32]) -> Result<String> {
        let bytes = self.bpe.decode_bytes(tokens).map_err(|e| RagError::TokenizerError {
            model: self.model.clone(),
            message: format!("failed to decode {} tokens: {e:?}", tokens.len()),
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_model_and_round_trips_ascii() {
        let tokenizer = TiktokenTokenizer::for_model("gpt-4o-mini").unwrap();
        let text = "Retrieval augmented generation splits articles into chunks.";
        let tokens = tokenizer.encode(text);
        assert!(!tokens.is_empty());
        assert_eq!(tokenizer.count(text), tokens.len());
        assert_eq!(tokenizer.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn unknown_model_is_an_error() {
        let err = TiktokenTokenizer::for_model("definitely-not-a-model").unwrap_err();
        assert!(matches!(err, RagError::TokenizerError { .. }));
    }
}
