//! The "readiness" header (spec.md §4.6 step 6): a summary of how
//! confident the result set is, attached alongside the ranked results
//! rather than folded into any individual score.

use serde::{Deserialize, Serialize};

use crate::scoring::ScoredCandidate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Readiness {
    pub returned: usize,
    pub expected: usize,
    pub avg_similarity: f64,
}

impl Readiness {
    /// `expected` is the caller's requested `k`; `returned` may fall
    /// short when fewer candidates survived the post-filters than `k`.
    pub fn summarize(results: &[ScoredCandidate], expected: usize) -> Self {
        let returned = results.len();
        let avg_similarity = if returned == 0 {
            0.0
        } else {
            results.iter().map(|c| c.score).sum::<f64>() / returned as f64
        };
        Self {
            returned,
            expected,
            avg_similarity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindstore_core::model::{Memory, MemoryType, QualityFactors};

    fn sample(score: f64) -> ScoredCandidate {
        let now = chrono::Utc::now();
        ScoredCandidate {
            memory: Memory {
                id: 1,
                content: "x".into(),
                tags: vec![],
                source: "test".into(),
                memory_type: MemoryType::Observation,
                quality_score: 0.5,
                quality_factors: QualityFactors::default(),
                embedding: None,
                access_count: 0,
                last_accessed: now,
                valid_from: None,
                valid_until: None,
                created_at: now,
                invalidated_by: None,
            },
            score,
        }
    }

    #[test]
    fn averages_scores_and_reports_shortfall() {
        let results = vec![sample(0.9), sample(0.7)];
        let readiness = Readiness::summarize(&results, 5);
        assert_eq!(readiness.returned, 2);
        assert_eq!(readiness.expected, 5);
        assert!((readiness.avg_similarity - 0.8).abs() < 1e-9);
    }

    #[test]
    fn empty_result_set_has_zero_avg_similarity() {
        let readiness = Readiness::summarize(&[], 3);
        assert_eq!(readiness.avg_similarity, 0.0);
    }
}
