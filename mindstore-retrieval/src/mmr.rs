//! Maximal marginal relevance diversification (spec.md §4.6 step 5):
//! greedily picks candidates that balance query relevance against
//! dissimilarity from what's already been picked.

use crate::scoring::ScoredCandidate;

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

/// Reranks `candidates` (already scored/sorted) by MMR against
/// `query_embedding`, stopping at `k`. Candidates lacking an embedding
/// are treated as maximally dissimilar from everything, so they never
/// dominate purely on the relevance term but also never get unfairly
/// excluded by the diversity term.
pub fn diversify(candidates: Vec<ScoredCandidate>, query_embedding: &[f32], lambda: f64, k: usize) -> Vec<ScoredCandidate> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let max_score = candidates.iter().map(|c| c.score).fold(f64::MIN, f64::max).max(1e-9);
    let mut pool: Vec<ScoredCandidate> = candidates;
    let mut selected: Vec<ScoredCandidate> = Vec::with_capacity(k.min(pool.len()));

    while !pool.is_empty() && selected.len() < k {
        let mut best_idx = 0;
        let mut best_mmr = f64::MIN;

        for (idx, candidate) in pool.iter().enumerate() {
            let relevance = match &candidate.memory.embedding {
                Some(emb) => cosine(emb, query_embedding),
                None => candidate.score / max_score,
            };
            let diversity_penalty = selected
                .iter()
                .map(|s| match (&candidate.memory.embedding, &s.memory.embedding) {
                    (Some(a), Some(b)) => cosine(a, b),
                    _ => 0.0,
                })
                .fold(0.0_f64, f64::max);

            let mmr = lambda * relevance - (1.0 - lambda) * diversity_penalty;
            if mmr > best_mmr {
                best_mmr = mmr;
                best_idx = idx;
            }
        }

        selected.push(pool.remove(best_idx));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindstore_core::model::{Memory, MemoryType, QualityFactors};

    fn sample(id: i64, score: f64, embedding: Vec<f32>) -> ScoredCandidate {
        let now = chrono::Utc::now();
        ScoredCandidate {
            memory: Memory {
                id,
                content: "x".into(),
                tags: vec![],
                source: "test".into(),
                memory_type: MemoryType::Observation,
                quality_score: 0.5,
                quality_factors: QualityFactors::default(),
                embedding: Some(embedding),
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
    fn prefers_diverse_candidate_over_near_duplicate() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            sample(1, 0.9, vec![1.0, 0.0]),
            sample(2, 0.89, vec![0.99, 0.01]),
            sample(3, 0.8, vec![0.0, 1.0]),
        ];
        let picked = diversify(candidates, &query, 0.5, 2);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].memory.id, 1);
        assert_eq!(picked[1].memory.id, 3);
    }

    #[test]
    fn stops_at_k() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            sample(1, 0.9, vec![1.0, 0.0]),
            sample(2, 0.8, vec![0.9, 0.1]),
            sample(3, 0.7, vec![0.0, 1.0]),
        ];
        let picked = diversify(candidates, &query, 0.5, 1);
        assert_eq!(picked.len(), 1);
    }
}
