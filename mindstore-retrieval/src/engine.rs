//! The hybrid search orchestrator (spec.md §4.6, component C6): wires
//! candidate retrieval, temporal decomposition, post-filters, and MMR
//! diversification into the one operation the dispatcher calls.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mindstore_core::config::RetrievalConfig;
use mindstore_core::errors::MindstoreResult;
use mindstore_core::model::Memory;
use mindstore_core::traits::vector::{Collection, VectorIndex};
use mindstore_core::traits::{RelationalBackend, Scope};
use mindstore_temporal::DecayParams;

use crate::fusion::{fuse, union_keep_max};
use crate::mmr::diversify;
use crate::readiness::Readiness;
use crate::scoring::{
    centrality_boost, dead_end_boost, point_in_time_filter, quality_boost, temporal_decay, ScoredCandidate,
};
use crate::temporal_query::decompose;
use tracing::{debug, warn};

/// Everything a single hybrid search call needs, spec.md §4.6's "query
/// string, its embedding, a limit `k`, a score floor, optional tags,
/// `since`, and an `as_of_date`".
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub scope: Scope,
    pub query: String,
    pub query_embedding: Vec<f32>,
    pub k: usize,
    pub score_threshold: Option<f64>,
    pub tags: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub as_of_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub memory_id: i64,
    pub score: f64,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub readiness: Readiness,
}

pub struct SearchEngine {
    backend: Arc<dyn RelationalBackend>,
    vectors: Arc<dyn VectorIndex>,
    lexical: Arc<mindstore_lexical::LexicalIndex>,
    retrieval: RetrievalConfig,
    decay: DecayParams,
    dead_end_boost_delta: f64,
    centrality_enabled: bool,
    centrality_weight: f64,
    quality_enabled: bool,
}

impl SearchEngine {
    pub fn new(
        backend: Arc<dyn RelationalBackend>,
        vectors: Arc<dyn VectorIndex>,
        lexical: Arc<mindstore_lexical::LexicalIndex>,
        config: &mindstore_core::config::MindstoreConfig,
    ) -> Self {
        Self {
            backend,
            vectors,
            lexical,
            retrieval: config.retrieval.clone(),
            decay: DecayParams {
                decay_rate: config.retention.decay_rate,
                access_weight: config.retention.access_weight,
                max_access_boost: config.retention.max_access_boost,
                use_temporal_decay: config.retention.use_temporal_decay,
            },
            dead_end_boost_delta: config.dead_end_boost,
            centrality_enabled: config.graph.centrality.enabled,
            centrality_weight: config.graph.centrality.weight,
            quality_enabled: config.quality_scoring.enabled,
        }
    }

    fn collection(scope: &Scope) -> Collection {
        match scope {
            Scope::Project(_) => Collection::Memories,
            Scope::Global => Collection::GlobalMemories,
        }
    }

    fn lexical_scope(scope: &Scope) -> mindstore_lexical::Scope {
        match scope {
            Scope::Project(_) => mindstore_lexical::Scope::ProjectMemories,
            Scope::Global => mindstore_lexical::Scope::GlobalMemories,
        }
    }

    /// Runs one fused candidate pass against `query`/`embedding`, preferring
    /// server-side hybrid fusion and falling back to in-process RRF over a
    /// dense lane plus a lexical lane (spec.md §4.6 step 1).
    async fn candidate_pass(
        &self,
        scope: &Scope,
        query: &str,
        embedding: &[f32],
        filter: &mindstore_core::traits::filter::Filter,
        lane_k: usize,
    ) -> MindstoreResult<Vec<(i64, f64)>> {
        let collection = Self::collection(scope);

        if self.vectors.supports_hybrid(collection) {
            let points = self
                .vectors
                .hybrid_search(collection, query, embedding, filter, lane_k, None)
                .await?;
            return Ok(points.into_iter().map(|p| (p.id, p.score)).collect());
        }

        let dense = self.vectors.search_dense(collection, embedding, filter, lane_k, None).await?;
        let dense_ranked: Vec<(i64, f64)> = dense.into_iter().map(|p| (p.id, p.score)).collect();
        let lexical_ranked = self.lexical.search(Self::lexical_scope(scope), query, lane_k);

        let fused = fuse(&lexical_ranked, &dense_ranked);
        Ok(fused.into_iter().map(|c| (c.id, c.rrf_score)).collect())
    }

    async fn resolve_memories(&self, scope: &Scope, ids: &[i64]) -> MindstoreResult<HashMap<i64, Memory>> {
        let mut out = HashMap::with_capacity(ids.len());
        match scope {
            Scope::Project(_) => {
                for memory in self.backend.get_memories(ids).await? {
                    out.insert(memory.id, memory);
                }
            }
            Scope::Global => {
                for id in ids {
                    if let Some(gm) = self.backend.get_global_memory(*id).await? {
                        out.insert(*id, gm.0);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Increments `access_count`/`last_accessed` on every memory actually
    /// surfaced to the caller, so the usage-boost term in temporal decay
    /// (spec.md §4.8) reflects real recall pressure on re-recall rather
    /// than staying permanently at its zero-access floor. Best-effort: a
    /// failed bump degrades this response's ranking, not its correctness.
    async fn bump_access_for_hits(&self, scope: &Scope, hits: &[ScoredCandidate], at: DateTime<Utc>) {
        for c in hits {
            let result = match scope {
                Scope::Project(_) => self.backend.bump_access(c.memory.id, at).await,
                Scope::Global => self.backend.bump_global_access(c.memory.id, at).await,
            };
            if let Err(e) = result {
                warn!(error = %e, memory_id = c.memory.id, "drift: bump_access failed for a recalled memory");
            }
        }
    }

    /// The canonical recall operation (spec.md §4.6).
    pub async fn search(&self, request: SearchRequest) -> MindstoreResult<SearchResponse> {
        let as_of = request.as_of_date.unwrap_or_else(Utc::now);
        let lane_k = request.k * 3;
        let filter = crate::filter_builder::build(&request.scope, request.since, as_of);

        let mut passes = vec![
            self.candidate_pass(&request.scope, &request.query, &request.query_embedding, &filter, lane_k)
                .await?,
        ];

        for sub in decompose(&request.query) {
            passes.push(
                self.candidate_pass(&request.scope, &sub.text, &request.query_embedding, &filter, lane_k)
                    .await?,
            );
        }

        let merged = union_keep_max(&passes);
        debug!(candidates = merged.len(), passes = passes.len(), "candidate retrieval complete");
        let ids: Vec<i64> = merged.iter().map(|(id, _)| *id).collect();
        let memories = self.resolve_memories(&request.scope, &ids).await?;

        // The lexical lane has no filter concept of its own and the builtin
        // vector adapter's brute-force scan applies the pushed-down filter
        // only through `Filter::is_null("invalidated_by")`, which the
        // in-process evaluator already honors — but a lexically-surfaced
        // candidate must still be dropped here explicitly since it never
        // passed through that filter at all.
        let mut candidates: Vec<ScoredCandidate> = merged
            .into_iter()
            .filter_map(|(id, score)| memories.get(&id).cloned().map(|memory| ScoredCandidate { memory, score }))
            .filter(|c| c.memory.invalidated_by.is_none())
            .filter(|c| request.tags.iter().all(|tag| c.memory.has_tag(tag)))
            .filter(|c| request.score_threshold.map(|t| c.score >= t).unwrap_or(true))
            .collect();

        candidates = point_in_time_filter(candidates, as_of);
        candidates = temporal_decay(candidates, &self.decay, as_of);
        candidates = dead_end_boost(candidates, self.dead_end_boost_delta);

        if self.centrality_enabled {
            let centrality: HashMap<i64, mindstore_core::model::Centrality> = self
                .backend
                .all_centrality()
                .await?
                .into_iter()
                .map(|c| (c.memory_id, c))
                .collect();
            candidates = centrality_boost(candidates, &centrality, self.centrality_weight);
        }

        if self.quality_enabled {
            candidates = quality_boost(candidates, self.retrieval.quality_boost_weight);
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });

        let diversified = if self.retrieval.mmr_enabled {
            diversify(candidates, &request.query_embedding, self.retrieval.mmr_lambda, request.k)
        } else {
            candidates.into_iter().take(request.k).collect()
        };

        self.bump_access_for_hits(&request.scope, &diversified, as_of).await;

        let readiness = Readiness::summarize(&diversified, request.k);
        debug!(?readiness, "hybrid search complete");
        let hits = diversified
            .into_iter()
            .map(|c| SearchHit {
                memory_id: c.memory.id,
                score: c.score,
                content: c.memory.content,
            })
            .collect();

        Ok(SearchResponse { hits, readiness })
    }
}

/// A hybrid search over code or prose chunks (spec.md §6's
/// `hybridSearchCode`/`hybridSearchDocs`). `code` selects the lexical
/// tokenizer variant (camelCase-aware vs. prose-stemmed) the same way
/// `mindstore_lexical::Scope::ProjectCode`/`ProjectDocs` already split
/// those two corpora; the dense lane hits the same `Documents`
/// collection for both, since code and docs chunks share one table.
#[derive(Debug, Clone)]
pub struct DocumentSearchRequest {
    pub project_id: String,
    pub query: String,
    pub query_embedding: Vec<f32>,
    pub k: usize,
    pub score_threshold: Option<f64>,
    pub code: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHit {
    pub document_id: i64,
    pub score: f64,
    pub file_path: String,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSearchResponse {
    pub hits: Vec<DocumentHit>,
}

impl SearchEngine {
    fn document_lexical_scope(code: bool) -> mindstore_lexical::Scope {
        if code {
            mindstore_lexical::Scope::ProjectCode
        } else {
            mindstore_lexical::Scope::ProjectDocs
        }
    }

    /// No temporal decay, quality boost, or centrality pass here — those
    /// are memory-specific retention concepts (spec.md §4.8) that don't
    /// apply to a source chunk. No MMR pass either: chunks already come
    /// pre-segmented at bounded granularity, so there's no near-duplicate
    /// redundancy to diversify away the way whole memories can overlap.
    pub async fn search_documents(&self, request: DocumentSearchRequest) -> MindstoreResult<DocumentSearchResponse> {
        let filter = mindstore_core::traits::filter::Filter::must([
            mindstore_core::traits::filter::Filter::eq_text("project_id", request.project_id.clone()),
            mindstore_core::traits::filter::Filter::eq_text(
                "doc_type",
                if request.code { "code" } else { "doc" }.to_string(),
            ),
        ]);
        let lane_k = request.k * 3;
        let lexical_scope = Self::document_lexical_scope(request.code);

        let candidates = if self.vectors.supports_hybrid(Collection::Documents) {
            self.vectors
                .hybrid_search(Collection::Documents, &request.query, &request.query_embedding, &filter, lane_k, None)
                .await?
                .into_iter()
                .map(|p| (p.id, p.score))
                .collect::<Vec<_>>()
        } else {
            let dense = self
                .vectors
                .search_dense(Collection::Documents, &request.query_embedding, &filter, lane_k, None)
                .await?;
            let dense_ranked: Vec<(i64, f64)> = dense.into_iter().map(|p| (p.id, p.score)).collect();
            let lexical_ranked = self.lexical.search(lexical_scope, &request.query, lane_k);
            fuse(&lexical_ranked, &dense_ranked).into_iter().map(|c| (c.id, c.rrf_score)).collect()
        };

        let ids: Vec<i64> = candidates.iter().map(|(id, _)| *id).collect();
        let rows = self.backend.get_documents(&ids).await?;
        let by_id: HashMap<i64, mindstore_core::model::Document> = rows.into_iter().map(|d| (d.id, d)).collect();

        let mut hits: Vec<DocumentHit> = candidates
            .into_iter()
            .filter(|(_, score)| request.score_threshold.map(|t| *score >= t).unwrap_or(true))
            .filter_map(|(id, score)| {
                by_id.get(&id).map(|d| DocumentHit {
                    document_id: id,
                    score,
                    file_path: d.bare_path().to_string(),
                    content: d.content.clone(),
                    start_line: d.start_line,
                    end_line: d.end_line,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(request.k);

        Ok(DocumentSearchResponse { hits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_scope_maps_project_and_global() {
        assert_eq!(
            SearchEngine::lexical_scope(&Scope::Project("p".into())),
            mindstore_lexical::Scope::ProjectMemories
        );
        assert_eq!(SearchEngine::lexical_scope(&Scope::Global), mindstore_lexical::Scope::GlobalMemories);
    }

    #[test]
    fn collection_maps_project_and_global() {
        assert!(matches!(
            SearchEngine::collection(&Scope::Project("p".into())),
            Collection::Memories
        ));
        assert!(matches!(SearchEngine::collection(&Scope::Global), Collection::GlobalMemories));
    }

    #[test]
    fn document_lexical_scope_splits_code_and_prose() {
        assert_eq!(SearchEngine::document_lexical_scope(true), mindstore_lexical::Scope::ProjectCode);
        assert_eq!(SearchEngine::document_lexical_scope(false), mindstore_lexical::Scope::ProjectDocs);
    }

    #[tokio::test]
    async fn search_bumps_access_count_on_resolved_hits() {
        let backend = Arc::new(mindstore_storage::EmbeddedBackend::open_in_memory().unwrap());
        let vectors: Arc<dyn VectorIndex> = Arc::new(mindstore_vector::BuiltinVectorIndex::new(backend.clone()));
        let lexical = Arc::new(mindstore_lexical::LexicalIndex::new());
        let engine = SearchEngine::new(
            backend.clone() as Arc<dyn RelationalBackend>,
            vectors,
            lexical,
            &mindstore_core::config::MindstoreConfig::default(),
        );

        let scope = Scope::Project("acme".into());
        let ids = backend
            .insert_memories(
                &scope,
                &[mindstore_core::traits::NewMemory {
                    content: "race condition in the flush path".into(),
                    tags: vec![],
                    source: "test".into(),
                    memory_type: mindstore_core::model::MemoryType::Observation,
                    quality_score: 0.8,
                    quality_factors: Default::default(),
                    embedding: Some(vec![1.0, 0.0]),
                    valid_from: None,
                    valid_until: None,
                }],
            )
            .await
            .unwrap();

        let request = SearchRequest {
            scope: scope.clone(),
            query: "race condition".into(),
            query_embedding: vec![1.0, 0.0],
            k: 5,
            score_threshold: None,
            tags: vec![],
            since: None,
            as_of_date: None,
        };

        engine.search(request.clone()).await.unwrap();
        let after_first = backend.get_memory(ids[0]).await.unwrap().unwrap();
        assert_eq!(after_first.access_count, 1);

        engine.search(request).await.unwrap();
        let after_second = backend.get_memory(ids[0]).await.unwrap().unwrap();
        assert_eq!(after_second.access_count, 2);

        let params = DecayParams::default();
        let now = Utc::now();
        let never_accessed = mindstore_temporal::weighted_quality(
            &Memory {
                access_count: 0,
                ..after_second.clone()
            },
            &params,
            now,
        );
        let re_recalled = mindstore_temporal::weighted_quality(&after_second, &params, now);
        assert!(re_recalled > never_accessed, "usage boost should raise the decay-adjusted score after re-recall");
    }

    async fn engine_for_documents() -> (SearchEngine, Arc<mindstore_storage::EmbeddedBackend>) {
        let backend = Arc::new(mindstore_storage::EmbeddedBackend::open_in_memory().unwrap());
        let vectors: Arc<dyn VectorIndex> = Arc::new(mindstore_vector::BuiltinVectorIndex::new(backend.clone()));
        let lexical = Arc::new(mindstore_lexical::LexicalIndex::new());
        let engine = SearchEngine::new(
            backend.clone() as Arc<dyn RelationalBackend>,
            vectors,
            lexical,
            &mindstore_core::config::MindstoreConfig::default(),
        );
        (engine, backend)
    }

    #[tokio::test]
    async fn search_documents_resolves_hits_scoped_to_project() {
        let (engine, backend) = engine_for_documents().await;
        let scope = Scope::Project("acme".into());
        backend
            .insert_documents(
                &scope,
                &[mindstore_core::traits::NewDocument {
                    file_path: "code:src/lib.rs".into(),
                    chunk_index: 0,
                    content: "fn hybrid_search() {}".into(),
                    start_line: 1,
                    end_line: 1,
                    embedding: Some(vec![0.1, 0.2, 0.3]),
                }],
            )
            .await
            .unwrap();
        let docs = backend.all_documents(&scope).await.unwrap();
        let built: Vec<(i64, String)> = docs.iter().map(|d| (d.id, d.content.clone())).collect();
        engine.lexical.build(mindstore_lexical::Scope::ProjectCode, &built);

        let response = engine
            .search_documents(DocumentSearchRequest {
                project_id: "acme".into(),
                query: "hybrid_search".into(),
                query_embedding: vec![0.1, 0.2, 0.3],
                k: 5,
                score_threshold: None,
                code: true,
            })
            .await
            .unwrap();

        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].file_path, "src/lib.rs");
    }
}
