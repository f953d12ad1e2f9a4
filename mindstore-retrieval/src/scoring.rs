//! Post-filters applied to fused candidates, in the fixed order spec.md
//! §4.6 step 4 lists: point-in-time, temporal decay (with auto-skip),
//! dead-end boost, centrality boost, quality boost.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use mindstore_core::model::{Centrality, Memory};
use mindstore_temporal::{weighted_quality, DecayParams};

/// A scored candidate carrying the memory it resolves to, threaded
/// through the post-filter pipeline so later stages can read
/// `memory_type`/`tags`/`access_count` without a second fetch.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub memory: Memory,
    pub score: f64,
}

/// Drops candidates whose stored validity places them entirely outside
/// `as_of`, per spec.md §4.8's "validity not knowledge horizon" reading:
/// a row is excluded if it didn't exist yet, or its validity window had
/// already ended, by `as_of`.
pub fn point_in_time_filter(candidates: Vec<ScoredCandidate>, as_of: DateTime<Utc>) -> Vec<ScoredCandidate> {
    candidates
        .into_iter()
        .filter(|c| {
            let m = &c.memory;
            if m.created_at > as_of {
                return false;
            }
            if let Some(from) = m.valid_from {
                if from > as_of {
                    return false;
                }
            }
            if let Some(until) = m.valid_until {
                if until < as_of {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Applies temporal decay unless every candidate is under 24h old, in
/// which case decay would only add noise to an already-fresh result set.
pub fn temporal_decay(
    mut candidates: Vec<ScoredCandidate>,
    params: &DecayParams,
    now: DateTime<Utc>,
) -> Vec<ScoredCandidate> {
    let all_fresh = candidates.iter().all(|c| {
        (now - c.memory.created_at).num_hours() < 24
    });
    if all_fresh {
        return candidates;
    }

    for c in &mut candidates {
        let weighted = weighted_quality(&c.memory, params, now);
        // weighted_quality folds in the memory's own quality_score; here
        // we only want its decay/usage multiplier, so divide it back out
        // when the stored quality score is nonzero.
        let multiplier = if c.memory.quality_score > 0.0 {
            weighted / c.memory.quality_score
        } else {
            1.0
        };
        c.score *= multiplier;
    }
    candidates
}

/// `s' = min(1, s + delta)` for dead-end memories (type `dead_end` or tag
/// `dead-end`), surfacing known dead ends even when their raw similarity
/// is mediocre.
pub fn dead_end_boost(mut candidates: Vec<ScoredCandidate>, delta: f64) -> Vec<ScoredCandidate> {
    for c in &mut candidates {
        if c.memory.is_dead_end() {
            c.score = (c.score + delta).min(1.0);
        }
    }
    candidates
}

/// `s' = s * (1 + gamma * normalized_degree)`, rewarding well-connected
/// memories. Candidates absent from `centrality` (never swept, or
/// isolated) are treated as degree zero.
pub fn centrality_boost(
    mut candidates: Vec<ScoredCandidate>,
    centrality: &HashMap<i64, Centrality>,
    gamma: f64,
) -> Vec<ScoredCandidate> {
    for c in &mut candidates {
        let normalized = centrality.get(&c.memory.id).map(|row| row.normalized_degree).unwrap_or(0.0);
        c.score *= 1.0 + gamma * normalized;
    }
    candidates
}

/// `s' = s * (1 - w + w * quality_score)`, blending the stored quality
/// score in proportion to `weight`.
pub fn quality_boost(mut candidates: Vec<ScoredCandidate>, weight: f64) -> Vec<ScoredCandidate> {
    for c in &mut candidates {
        c.score *= 1.0 - weight + weight * c.memory.quality_score;
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindstore_core::model::{MemoryType, QualityFactors};

    fn sample(id: i64, memory_type: MemoryType, tags: Vec<&str>, quality: f64) -> Memory {
        let now = Utc::now();
        Memory {
            id,
            content: "x".into(),
            tags: tags.into_iter().map(String::from).collect(),
            source: "test".into(),
            memory_type,
            quality_score: quality,
            quality_factors: QualityFactors::default(),
            embedding: None,
            access_count: 0,
            last_accessed: now,
            valid_from: None,
            valid_until: None,
            created_at: now,
            invalidated_by: None,
        }
    }

    #[test]
    fn point_in_time_drops_rows_created_after_as_of() {
        let as_of = Utc::now() - chrono::Duration::days(1);
        let memory = sample(1, MemoryType::Observation, vec![], 0.5);
        let candidates = vec![ScoredCandidate { memory, score: 0.9 }];
        assert!(point_in_time_filter(candidates, as_of).is_empty());
    }

    #[test]
    fn dead_end_boost_raises_score_but_caps_at_one() {
        let memory = sample(1, MemoryType::DeadEnd, vec![], 0.5);
        let candidates = vec![ScoredCandidate { memory, score: 0.95 }];
        let boosted = dead_end_boost(candidates, 0.15);
        assert_eq!(boosted[0].score, 1.0);
    }

    #[test]
    fn dead_end_tag_also_triggers_boost() {
        let memory = sample(1, MemoryType::Observation, vec!["dead-end"], 0.5);
        let candidates = vec![ScoredCandidate { memory, score: 0.5 }];
        let boosted = dead_end_boost(candidates, 0.15);
        assert!((boosted[0].score - 0.65).abs() < 1e-9);
    }

    #[test]
    fn centrality_boost_rewards_connected_memories() {
        let memory = sample(1, MemoryType::Observation, vec![], 0.5);
        let mut centrality = HashMap::new();
        centrality.insert(
            1,
            Centrality {
                memory_id: 1,
                degree: 4,
                normalized_degree: 1.0,
            },
        );
        let candidates = vec![ScoredCandidate { memory, score: 0.5 }];
        let boosted = centrality_boost(candidates, &centrality, 0.1);
        assert!((boosted[0].score - 0.55).abs() < 1e-9);
    }

    #[test]
    fn quality_boost_blends_toward_stored_quality() {
        let memory = sample(1, MemoryType::Observation, vec![], 1.0);
        let candidates = vec![ScoredCandidate { memory, score: 0.5 }];
        let boosted = quality_boost(candidates, 0.5);
        assert!((boosted[0].score - 0.625).abs() < 1e-9);
    }

    #[test]
    fn all_fresh_candidates_skip_decay() {
        let memory = sample(1, MemoryType::Observation, vec![], 0.9);
        let candidates = vec![ScoredCandidate { memory, score: 0.5 }];
        let decayed = temporal_decay(candidates, &DecayParams::default(), Utc::now());
        assert_eq!(decayed[0].score, 0.5);
    }
}
