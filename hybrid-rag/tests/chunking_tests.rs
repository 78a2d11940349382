//! Property tests for chunk windowing and chunk identity.

use std::collections::HashSet;
use std::sync::Arc;

use hybrid_rag::identity::{chunk_hash, normalize};
use hybrid_rag::{
    CharacterChunker, Chunker, ChunkingStrategy, RagConfig, RawDocument, RecursiveChunker,
    TiktokenTokenizer, TokenChunker, Tokenizer, build_chunker, chunk_document,
};
use proptest::prelude::*;

/// One token per character, so token windows can be checked against the text exactly.
struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[u32]) -> hybrid_rag::Result<String> {
        Ok(tokens.iter().filter_map(|t| char::from_u32(*t)).collect())
    }
}

fn expected_windows(len: usize, size: usize, overlap: usize) -> usize {
    match len {
        0 => 0,
        n if n <= size => 1,
        n => (n - overlap).div_ceil(size - overlap),
    }
}

fn document(text: &str) -> RawDocument {
    RawDocument {
        row_id: 9,
        title: None,
        author: Some("a".into()),
        source: None,
        text: text.to_string(),
        hash: String::new(),
    }
}

/// Character windows: count follows the closed form, every chunk fits the
/// budget, and dropping each chunk's overlap prefix reassembles the text.
mod prop_character_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn count_and_reassembly(
            text in "[a-zé ]{0,400}",
            size in 2usize..60,
            overlap_frac in 0.0f64..1.0,
        ) {
            let overlap = ((size as f64) * overlap_frac) as usize % size;
            let chunker = CharacterChunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&text).unwrap();
            let len = text.chars().count();

            prop_assert_eq!(chunks.len(), expected_windows(len, size, overlap));
            prop_assert!(chunks.iter().all(|c| c.chars().count() <= size && !c.is_empty()));

            let mut rebuilt = String::new();
            for (i, chunk) in chunks.iter().enumerate() {
                let skip = if i == 0 { 0 } else { overlap };
                rebuilt.extend(chunk.chars().skip(skip));
            }
            prop_assert_eq!(rebuilt, text);
        }
    }
}

/// Token windows: same closed-form count, and each window after the first
/// starts with the last `overlap` tokens of the one before.
mod prop_token_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn count_overlap_and_reassembly(
            text in "[a-z.,]{1,300}",
            size in 2usize..40,
            overlap_frac in 0.0f64..1.0,
        ) {
            let overlap = ((size as f64) * overlap_frac) as usize % size;
            let chunker = TokenChunker::new(Arc::new(CharTokenizer), size, overlap).unwrap();
            let chunks = chunker.split(&text).unwrap();

            prop_assert_eq!(chunks.len(), expected_windows(text.len(), size, overlap));
            for pair in chunks.windows(2) {
                let tail = &pair[0][pair[0].len() - overlap..];
                prop_assert!(pair[1].starts_with(tail));
            }

            let mut rebuilt = chunks[0].clone();
            for chunk in &chunks[1..] {
                rebuilt.push_str(&chunk[overlap..]);
            }
            prop_assert_eq!(rebuilt, text);
        }
    }
}

/// Chunk hashes ignore case and whitespace runs.
mod prop_chunk_hash_normalization {
    use super::*;

    proptest! {
        #[test]
        fn case_and_spacing_do_not_change_hash(
            words in proptest::collection::vec("[a-zA-Z]{1,8}", 1..10),
        ) {
            let tight = words.join(" ");
            let loose = format!("  {}\n", words.join(" \t  ").to_uppercase());
            prop_assert_eq!(normalize(&tight), normalize(&loose));
            prop_assert_eq!(chunk_hash(&tight), chunk_hash(&loose));
        }
    }
}

#[test]
fn content_change_changes_hash() {
    assert_ne!(chunk_hash("arguments are war"), chunk_hash("arguments are dance"));
}

#[test]
fn chunk_ids_are_unique_for_repeated_text() {
    let chunker = CharacterChunker::new(10, 0).unwrap();
    let chunks = chunk_document(&chunker, &document(&"abcdefghij".repeat(5))).unwrap();
    assert_eq!(chunks.len(), 5);
    assert!(chunks.iter().all(|c| c.chunk_hash == chunks[0].chunk_hash));

    let ids: HashSet<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids.len(), 5);
    assert_eq!(chunks[3].chunk_id, format!("9_chunk_3_{}", &chunks[3].chunk_hash[..8]));
    assert!(chunks.iter().enumerate().all(|(i, c)| c.sequence == i && c.source_row_id == 9));
    assert_eq!(chunks[0].metadata.author.as_deref(), Some("a"));
}

#[test]
fn empty_document_has_no_chunks() {
    let chunker = CharacterChunker::new(10, 2).unwrap();
    assert!(chunk_document(&chunker, &document("")).unwrap().is_empty());
}

#[test]
fn token_window_count_follows_closed_form() {
    let chunker = TokenChunker::for_model("gpt-4o-mini", 8, 2).unwrap();
    let text = "Metaphors structure how we perceive, how we think, and what we do. ".repeat(6);
    let chunks = chunker.split(&text).unwrap();

    let tokens = chunker.count_tokens(&text);
    assert!(tokens > 8);
    assert_eq!(chunks.len(), (tokens - 2).div_ceil(6));
}

#[test]
fn recursive_keeps_fitting_paragraphs_whole() {
    let token_chunker = TokenChunker::for_model("gpt-4o-mini", 12, 2).unwrap();
    let short = "Time is money.";
    let long = "Argument is war and we attack positions, defend claims, and win or lose debates \
                with strategies that shift as the exchange goes on.";
    let text = format!("{short}\n\n\n\n{long}\n\n");

    let chunks = RecursiveChunker::new(token_chunker.clone()).split(&text).unwrap();
    assert_eq!(chunks[0], short);
    assert_eq!(chunks.len(), 1 + token_chunker.split(long).unwrap().len());
    assert!(chunks.len() > 2);
}

#[test]
fn paragraph_exactly_at_budget_is_kept() {
    let token_chunker = TokenChunker::for_model("gpt-4o-mini", 50, 5).unwrap();
    let paragraph = "one two three four five six seven";
    let budget = token_chunker.count_tokens(paragraph);
    let exact = TokenChunker::for_model("gpt-4o-mini", budget, 1).unwrap();

    let chunks = RecursiveChunker::new(exact).split(paragraph).unwrap();
    assert_eq!(chunks, vec![paragraph.to_string()]);
}

#[test]
fn bpe_windows_overlap_by_decoded_tokens() {
    let tokenizer = TiktokenTokenizer::for_model("gpt-4o-mini").unwrap();
    let text = "Conduit metaphors treat ideas as objects and words as containers. ".repeat(5);
    let tokens = tokenizer.encode(&text);
    let (size, overlap) = (10, 3);
    let chunker = TokenChunker::for_model("gpt-4o-mini", size, overlap).unwrap();
    let chunks = chunker.split(&text).unwrap();
    assert_eq!(chunks.len(), (tokens.len() - overlap).div_ceil(size - overlap));

    let step = size - overlap;
    let mut rebuilt = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let start = i * step;
        let end = (start + size).min(tokens.len());
        assert_eq!(chunk, &tokenizer.decode(&tokens[start..end]).unwrap());
        if i > 0 {
            let shared = tokenizer.decode(&tokens[start..start + overlap]).unwrap();
            assert!(chunks[i - 1].ends_with(&shared));
            assert!(chunk.starts_with(&shared));
        }
        let fresh = if i == 0 { start } else { start + overlap };
        rebuilt.push_str(&tokenizer.decode(&tokens[fresh..end]).unwrap());
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn configured_token_and_recursive_chunkers_use_token_budget() {
    let text = "Metaphors structure how we perceive, how we think, and what we do. ".repeat(4);
    let text = text.trim_end();
    let direct = TokenChunker::for_model("gpt-4o-mini", 8, 2).unwrap().split(text).unwrap();

    for (strategy, name) in
        [(ChunkingStrategy::Token, "token"), (ChunkingStrategy::Recursive, "recursive")]
    {
        let config = RagConfig::builder()
            .chunking_strategy(strategy)
            .chunk_size(8)
            .chunk_overlap(2)
            .build()
            .unwrap();
        let chunker = build_chunker(&config.chunking).unwrap();
        assert_eq!(chunker.name(), name);
        assert_eq!(chunker.split(text).unwrap(), direct);
    }
}

#[test]
fn configured_token_chunker_rejects_unknown_tokenizer() {
    let mut config = RagConfig::default();
    config.chunking.strategy = ChunkingStrategy::Token;
    config.chunking.tokenizer_model = "no-such-model".into();
    assert!(build_chunker(&config.chunking).is_err());
}

#[test]
fn whitespace_only_document_has_no_chunks() {
    let chunker = CharacterChunker::new(10, 2).unwrap();
    assert!(chunk_document(&chunker, &document("   ")).unwrap().is_empty());
    assert!(chunk_document(&chunker, &document("\n\t \u{1f}")).unwrap().is_empty());
}

#[test]
fn trailing_whitespace_window_is_dropped() {
    let chunker = CharacterChunker::new(10, 0).unwrap();
    let text = format!("{}{}", "abcdefghij", " ".repeat(25));
    assert_eq!(chunker.split(&text).unwrap().len(), 4);

    let chunks = chunk_document(&chunker, &document(&text)).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].chunk_text, "abcdefghij");
    assert_eq!(chunks[0].sequence, 0);
    assert_ne!(chunks[0].chunk_hash, chunk_hash(""));
}
