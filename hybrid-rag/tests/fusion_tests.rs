//! Reciprocal rank fusion scores and cross-collection merging.

use hybrid_rag::fusion::DEFAULT_RANK_CONSTANT;
use hybrid_rag::{MergeStrategy, RetrievalMatch, merge_ranked, reciprocal_rank_fusion};
use proptest::prelude::*;
use serde_json::Map;

fn hit(id: &str, score: f32) -> RetrievalMatch {
    RetrievalMatch { id: id.into(), score, text: format!("text of {id}"), metadata: Map::new() }
}

fn ids(matches: &[RetrievalMatch]) -> Vec<&str> {
    matches.iter().map(|m| m.id.as_str()).collect()
}

#[test]
fn fused_scores_sum_reciprocal_ranks() {
    let dense = vec![hit("a", 0.9), hit("b", 0.8), hit("c", 0.7)];
    let sparse = vec![hit("c", 12.0), hit("d", 4.0)];
    let fused = reciprocal_rank_fusion(&[dense, sparse], 60.0);

    let score = |id: &str| fused.iter().find(|m| m.id == id).unwrap().score;
    assert!((score("c") - (1.0 / 63.0 + 1.0 / 61.0)).abs() < 1e-7);
    assert!((score("a") - 1.0 / 61.0).abs() < 1e-7);
    assert!((score("d") - 1.0 / 62.0).abs() < 1e-7);
    assert_eq!(ids(&fused), vec!["c", "a", "b", "d"]);
    assert_eq!(fused[0].text, "text of c");
}

#[test]
fn ties_keep_first_appearance_order() {
    let fused = reciprocal_rank_fusion(&[vec![hit("x", 1.0)], vec![hit("y", 1.0)]], 60.0);
    assert_eq!(ids(&fused), vec!["x", "y"]);
    assert_eq!(fused[0].score, fused[1].score);
}

#[test]
fn empty_inputs_fuse_to_nothing() {
    assert!(reciprocal_rank_fusion(&[vec![], vec![]], 60.0).is_empty());
}

#[test]
fn min_max_merge_puts_each_list_on_one_scale() {
    // Cosine scores near 0.8 and RRF scores near 0.03: raw sorting buries the hybrid list.
    let dense = vec![hit("a", 0.82), hit("b", 0.80)];
    let hybrid = vec![hit("c", 0.032), hit("d", 0.016)];

    let raw = merge_ranked(
        vec![dense.clone(), hybrid.clone()],
        MergeStrategy::RawScore,
        DEFAULT_RANK_CONSTANT,
        3,
    );
    assert_eq!(ids(&raw), vec!["a", "b", "c"]);

    let scaled = merge_ranked(vec![dense, hybrid], MergeStrategy::MinMax, DEFAULT_RANK_CONSTANT, 4);
    assert_eq!(scaled[0].score, 1.0);
    assert_eq!(scaled[1].score, 1.0);
    assert_eq!(ids(&scaled)[2..], ["b", "d"]);
}

#[test]
fn reciprocal_rank_merge_rewards_agreement() {
    let dense = vec![hit("a", 0.9), hit("shared", 0.85)];
    let hybrid = vec![hit("shared", 0.03), hit("c", 0.02)];
    let merged =
        merge_ranked(vec![dense, hybrid], MergeStrategy::ReciprocalRank, DEFAULT_RANK_CONSTANT, 2);
    assert_eq!(ids(&merged), vec!["shared", "a"]);
}

fn arb_list(prefix: &'static str) -> impl Strategy<Value = Vec<RetrievalMatch>> {
    proptest::sample::subsequence((0..30).collect::<Vec<u32>>(), 0..30).prop_map(move |picked| {
        picked.into_iter().map(|n| hit(&format!("{prefix}{n}"), 0.0)).collect()
    })
}

proptest! {
    /// Fusion output is non-increasing and every score is the sum of its rank terms.
    #[test]
    fn fusion_is_ordered_and_exact(
        dense in arb_list("p"),
        sparse in arb_list("p"),
        rank_constant in 0.0f32..100.0,
    ) {
        let fused = reciprocal_rank_fusion(&[dense.clone(), sparse.clone()], rank_constant);

        for pair in fused.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for m in &fused {
            let term = |list: &[RetrievalMatch]| {
                list.iter()
                    .position(|c| c.id == m.id)
                    .map_or(0.0, |i| 1.0 / (rank_constant + (i + 1) as f32))
            };
            let expected = term(&dense) + term(&sparse);
            prop_assert!((m.score - expected).abs() < 1e-6);
        }
    }
}
