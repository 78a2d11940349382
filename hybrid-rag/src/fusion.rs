//! Rank fusion and score normalization over ranked match lists.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::MergeStrategy;
use crate::document::RetrievalMatch;

/// Default `k` in `1 / (k + rank)`.
pub const DEFAULT_RANK_CONSTANT: f32 = 60.0;

/// Sort by descending score. Equal scores keep their current relative order.
pub fn sort_by_score_desc(matches: &mut [RetrievalMatch]) {
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Fuse ranked lists with Reciprocal Rank Fusion.
///
/// Each list must already be ordered best first. A candidate's fused score is
/// the sum of `1 / (rank_constant + rank)` over every list it appears in, with
/// 1-based ranks. Candidates are identified by id; the first occurrence
/// supplies text and metadata. The result is ordered by descending fused
/// score, ties broken by first appearance.
pub fn reciprocal_rank_fusion(
    lists: &[Vec<RetrievalMatch>],
    rank_constant: f32,
) -> Vec<RetrievalMatch> {
    let mut fused: Vec<RetrievalMatch> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for list in lists {
        for (index, candidate) in list.iter().enumerate() {
            let contribution = 1.0 / (rank_constant + (index + 1) as f32);
            match position.get(&candidate.id) {
                Some(&at) => fused[at].score += contribution,
                None => {
                    position.insert(candidate.id.clone(), fused.len());
                    fused.push(RetrievalMatch { score: contribution, ..candidate.clone() });
                }
            }
        }
    }

    sort_by_score_desc(&mut fused);
    fused
}

/// Rescale scores linearly onto `[0, 1]`.
///
/// If every score is equal (including a single score) all map to 1.0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    scores
        .iter()
        .map(|s| if range > f32::EPSILON { (s - min) / range } else { 1.0 })
        .collect()
}

/// Keep the highest-scoring occurrence of each id, in descending score order.
fn dedup_by_best(mut matches: Vec<RetrievalMatch>) -> Vec<RetrievalMatch> {
    sort_by_score_desc(&mut matches);
    let mut seen = std::collections::HashSet::new();
    matches.retain(|m| seen.insert(m.id.clone()));
    matches
}

/// Merge result lists from different collections into one top-`k` list.
///
/// - [`MergeStrategy::RawScore`] concatenates and sorts by the scores as
///   returned, even though they may come from different scales.
/// - [`MergeStrategy::MinMax`] rescales each list to `[0, 1]` first.
/// - [`MergeStrategy::ReciprocalRank`] runs a second RRF pass with each list
///   as one input.
///
/// An id present in several lists appears once in the output.
pub fn merge_ranked(
    lists: Vec<Vec<RetrievalMatch>>,
    strategy: MergeStrategy,
    rank_constant: f32,
    k: usize,
) -> Vec<RetrievalMatch> {
    let mut merged = match strategy {
        MergeStrategy::RawScore => dedup_by_best(lists.into_iter().flatten().collect()),
        MergeStrategy::MinMax => {
            let rescaled = lists.into_iter().flat_map(|list| {
                let scores: Vec<f32> = list.iter().map(|m| m.score).collect();
                list.into_iter()
                    .zip(min_max_normalize(&scores))
                    .map(|(m, score)| RetrievalMatch { score, ..m })
                    .collect::<Vec<_>>()
            });
            dedup_by_best(rescaled.collect())
        }
        MergeStrategy::ReciprocalRank => reciprocal_rank_fusion(&lists, rank_constant),
    };
    merged.truncate(k);
    merged
}
