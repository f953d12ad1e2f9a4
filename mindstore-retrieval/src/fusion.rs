//! Reciprocal Rank Fusion (spec.md §4.6 step 1): `RRF(r) = Σ 1/(k + rank)`
//! across one or more ranked lanes, combined without needing to normalize
//! scores across retrieval methods that aren't on the same scale.

use std::collections::HashMap;

use mindstore_core::constants::RRF_K;

/// A fused candidate, keeping the rank each lane assigned it (or `None` if
/// the lane never surfaced it) for downstream tie-breaking and debugging.
#[derive(Debug, Clone, Copy)]
pub struct FusedCandidate {
    pub id: i64,
    pub rrf_score: f64,
    pub lexical_rank: Option<usize>,
    pub dense_rank: Option<usize>,
}

/// Fuses up to two ranked lanes (lexical, dense), each a list of
/// `(id, score)` pairs already sorted best-first. Positional rank (1-based)
/// is what feeds the RRF formula, not the raw score, so the two lanes
/// never need to be on a comparable scale.
pub fn fuse(lexical: &[(i64, f64)], dense: &[(i64, f64)]) -> Vec<FusedCandidate> {
    let mut scores: HashMap<i64, f64> = HashMap::new();
    let mut lexical_ranks: HashMap<i64, usize> = HashMap::new();
    let mut dense_ranks: HashMap<i64, usize> = HashMap::new();

    for (rank, (id, _)) in lexical.iter().enumerate() {
        let rank = rank + 1;
        *scores.entry(*id).or_default() += 1.0 / (RRF_K as f64 + rank as f64);
        lexical_ranks.insert(*id, rank);
    }
    for (rank, (id, _)) in dense.iter().enumerate() {
        let rank = rank + 1;
        *scores.entry(*id).or_default() += 1.0 / (RRF_K as f64 + rank as f64);
        dense_ranks.insert(*id, rank);
    }

    let mut fused: Vec<FusedCandidate> = scores
        .into_iter()
        .map(|(id, rrf_score)| FusedCandidate {
            id,
            rrf_score,
            lexical_rank: lexical_ranks.get(&id).copied(),
            dense_rank: dense_ranks.get(&id).copied(),
        })
        .collect();

    fused.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

/// Unions two `(id, similarity)` passes, keeping the max similarity per id
/// — used for temporal-decomposition and query-expansion sub-query
/// candidate passes (spec.md §4.6 steps 2-3), which union by id rather
/// than fuse by rank since they're all the same similarity metric.
pub fn union_keep_max(passes: &[Vec<(i64, f64)>]) -> Vec<(i64, f64)> {
    let mut best: HashMap<i64, f64> = HashMap::new();
    for pass in passes {
        for (id, score) in pass {
            best.entry(*id)
                .and_modify(|s| *s = s.max(*score))
                .or_insert(*score);
        }
    }
    let mut merged: Vec<(i64, f64)> = best.into_iter().collect();
    merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_in_both_lanes_outrank_single_lane_items() {
        let lexical = vec![(1, 10.0), (2, 9.0)];
        let dense = vec![(2, 0.9), (3, 0.8)];
        let fused = fuse(&lexical, &dense);
        assert_eq!(fused[0].id, 2);
        assert_eq!(fused[0].lexical_rank, Some(2));
        assert_eq!(fused[0].dense_rank, Some(1));
    }

    #[test]
    fn union_keep_max_prefers_higher_score_across_passes() {
        let passes = vec![vec![(1, 0.4)], vec![(1, 0.9), (2, 0.2)]];
        let merged = union_keep_max(&passes);
        assert_eq!(merged[0], (1, 0.9));
    }
}
