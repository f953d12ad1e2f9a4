//! Built-in vector mode: no separate index is maintained. The embedding
//! already lives on the document/memory row itself, so [`VectorIndex`]
//! here is a thin brute-force scan over [`RelationalBackend`] plus
//! in-process filter evaluation and scoring — adequate up to the
//! few-hundred-thousand-row ceiling spec.md §4.4 names.

use std::sync::Arc;

use async_trait::async_trait;

use mindstore_core::errors::{MindstoreResult, Unsupported};
use mindstore_core::model::Memory;
use mindstore_core::traits::filter::{Filter, FilterValue};
use mindstore_core::traits::vector::{Collection, Payload, ScoredPoint, VectorIndex, VectorUpsert};
use mindstore_core::traits::{RelationalBackend, Scope};

use crate::filter_eval;
use crate::payload::{document_payload, memory_payload};

pub struct BuiltinVectorIndex {
    backend: Arc<dyn RelationalBackend>,
}

impl BuiltinVectorIndex {
    pub fn new(backend: Arc<dyn RelationalBackend>) -> Self {
        Self { backend }
    }

    /// Built-in mode has no separate payload store, so a filter's
    /// `project_id` clause is the only way to know which scope to scan.
    /// Falls back to the global scope when the filter names none, which
    /// matches querying a collection that was never project-partitioned.
    fn scope_from_filter(filter: &Filter) -> Scope {
        fn find(filter: &Filter) -> Option<String> {
            match filter {
                Filter::MatchValue { field, value } if field == "project_id" => match value {
                    FilterValue::Text(s) => Some(s.clone()),
                    _ => None,
                },
                Filter::Must(cs) | Filter::Should(cs) => cs.iter().find_map(find),
                _ => None,
            }
        }
        match find(filter) {
            Some(id) => Scope::Project(id),
            None => Scope::Global,
        }
    }

    async fn scored_candidates(
        &self,
        collection: Collection,
        scope: &Scope,
        vector: &[f32],
    ) -> MindstoreResult<Vec<(i64, f64, Payload)>> {
        match collection {
            Collection::Documents => {
                let docs = self.backend.all_documents(scope).await?;
                Ok(docs
                    .into_iter()
                    .filter_map(|d| {
                        let sim = d.embedding.as_ref().map(|e| cosine(e, vector))?;
                        let payload = document_payload(&d, scope);
                        Some((d.id, sim, payload))
                    })
                    .collect())
            }
            Collection::Memories => {
                let matches = self
                    .backend
                    .cosine_search_memories(scope, vector, usize::MAX)
                    .await?;
                Ok(matches
                    .into_iter()
                    .map(|(m, sim)| {
                        let payload = memory_payload(&m, scope);
                        (m.id, sim, payload)
                    })
                    .collect())
            }
            Collection::GlobalMemories => {
                let memories = self.backend.all_global_memories().await?;
                Ok(memories
                    .into_iter()
                    .filter_map(|gm| {
                        let m: Memory = gm.0;
                        let sim = m.embedding.as_ref().map(|e| cosine(e, vector))?;
                        let payload = memory_payload(&m, &Scope::Global);
                        Some((m.id, sim, payload))
                    })
                    .collect())
            }
        }
    }
}

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

#[async_trait]
impl VectorIndex for BuiltinVectorIndex {
    /// The relational schema already carries every column the built-in
    /// mode needs; there is no separate collection to create, and a
    /// single-vector-only mode can never be "outdated" relative to itself.
    async fn ensure_collection(&self, _collection: Collection, _dims: usize) -> MindstoreResult<bool> {
        Ok(false)
    }

    /// No-op: the embedding is written onto the row at insert/update time
    /// by the relational store itself, so there is nothing separate to
    /// upsert here. Kept as a real async fn (not `unimplemented!`) so a
    /// backfill pass over a built-in store is harmless rather than a hard
    /// error.
    async fn upsert(&self, _collection: Collection, _point: VectorUpsert) -> MindstoreResult<()> {
        Ok(())
    }

    async fn upsert_batch(&self, _collection: Collection, _points: &[VectorUpsert]) -> MindstoreResult<()> {
        Ok(())
    }

    async fn delete(&self, _collection: Collection, _ids: &[i64]) -> MindstoreResult<()> {
        Ok(())
    }

    async fn search_dense(
        &self,
        collection: Collection,
        vector: &[f32],
        filter: &Filter,
        k: usize,
        score_threshold: Option<f64>,
    ) -> MindstoreResult<Vec<ScoredPoint>> {
        let scope = Self::scope_from_filter(filter);
        let candidates = self.scored_candidates(collection, &scope, vector).await?;
        let mut scored: Vec<ScoredPoint> = candidates
            .into_iter()
            .filter(|(_, _, payload)| filter_eval::matches(filter, payload))
            .filter(|(_, score, _)| score_threshold.map(|t| *score >= t).unwrap_or(true))
            .map(|(id, score, payload)| ScoredPoint { id, score, payload })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// Built-in mode has no server-side lexical model; hybrid search is
    /// unsupported and the dispatcher is expected to check
    /// [`VectorIndex::supports_hybrid`] before calling this.
    async fn hybrid_search(
        &self,
        _collection: Collection,
        _text: &str,
        _vector: &[f32],
        _filter: &Filter,
        _k: usize,
        _score_threshold: Option<f64>,
    ) -> MindstoreResult<Vec<ScoredPoint>> {
        Err(Unsupported("built-in vector mode has no server-side lexical fusion".into()).into())
    }

    fn supports_hybrid(&self, _collection: Collection) -> bool {
        false
    }

    async fn find_similar(
        &self,
        collection: Collection,
        vector: &[f32],
        filter: &Filter,
        threshold: f64,
    ) -> MindstoreResult<Option<ScoredPoint>> {
        let mut top = self
            .search_dense(collection, vector, filter, 1, Some(threshold))
            .await?;
        Ok(top.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindstore_core::model::MemoryType;
    use mindstore_storage::EmbeddedBackend;

    fn sample(content: &str, embedding: Vec<f32>) -> mindstore_core::traits::NewMemory {
        mindstore_core::traits::NewMemory {
            content: content.to_string(),
            tags: vec![],
            source: "test".into(),
            memory_type: MemoryType::Observation,
            quality_score: 0.5,
            quality_factors: Default::default(),
            embedding: Some(embedding),
            valid_from: None,
            valid_until: None,
        }
    }

    #[tokio::test]
    async fn search_dense_scopes_by_project_id_filter() {
        let backend: Arc<dyn RelationalBackend> = Arc::new(EmbeddedBackend::open_in_memory().unwrap());
        let scope = Scope::Project("proj".into());
        backend
            .insert_memories(&scope, &[sample("match", vec![1.0, 0.0]), sample("other", vec![0.0, 1.0])])
            .await
            .unwrap();
        let index = BuiltinVectorIndex::new(backend);
        let filter = Filter::eq_text("project_id", "proj");
        let results = index
            .search_dense(Collection::Memories, &[1.0, 0.0], &filter, 1, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload["content"], "match");
    }

    #[tokio::test]
    async fn hybrid_search_is_unsupported() {
        let backend: Arc<dyn RelationalBackend> = Arc::new(EmbeddedBackend::open_in_memory().unwrap());
        let index = BuiltinVectorIndex::new(backend);
        assert!(!index.supports_hybrid(Collection::Memories));
        let result = index
            .hybrid_search(Collection::Memories, "q", &[1.0], &Filter::Must(vec![]), 5, None)
            .await;
        assert!(result.is_err());
    }
}
