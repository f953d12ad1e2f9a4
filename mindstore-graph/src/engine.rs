//! Memory graph operations (spec.md §4.7): link CRUD, invalidation, BFS
//! traversal, auto-linking by similarity, and the centrality sweep.
//! Sits directly on [`RelationalBackend`] for persistence and
//! [`VectorIndex`] for the nearest-neighbor lookups `autoLink` needs —
//! there is no separate graph storage, the same way the teacher's
//! `sync.rs` treats the in-memory graph as a view rebuilt from storage
//! rather than a second source of truth.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;

use mindstore_core::errors::{MindstoreResult, ValidationError};
use mindstore_core::model::{Centrality, MemoryLink, RelationKind};
use mindstore_core::traits::filter::Filter;
use mindstore_core::traits::vector::{Collection, VectorIndex};
use mindstore_core::traits::{NewMemoryLink, RelationalBackend, Scope};

use crate::indexed_graph::IndexedGraph;
use crate::traversal::{self, ConnectedMemory, DEFAULT_MAX_DEPTH};

#[derive(Debug, Clone)]
pub struct GraphStats {
    pub total_memories: usize,
    pub total_effective_links: usize,
    pub avg_links_per_memory: f64,
    pub isolated_memory_count: usize,
    pub relation_histogram: HashMap<RelationKind, usize>,
}

pub struct MemoryGraph {
    backend: Arc<dyn RelationalBackend>,
    vectors: Arc<dyn VectorIndex>,
}

impl MemoryGraph {
    pub fn new(backend: Arc<dyn RelationalBackend>, vectors: Arc<dyn VectorIndex>) -> Self {
        Self { backend, vectors }
    }

    pub async fn create_link(&self, link: NewMemoryLink) -> MindstoreResult<(i64, bool)> {
        if link.source_id == link.target_id {
            return Err(ValidationError::SelfLink { id: link.source_id }.into());
        }
        self.backend.upsert_link(&link).await
    }

    pub async fn invalidate_link(
        &self,
        source_id: i64,
        target_id: i64,
        relation: RelationKind,
    ) -> MindstoreResult<()> {
        self.backend
            .invalidate_link(source_id, target_id, relation, Utc::now())
            .await
    }

    /// Finds up to `max_links` nearest memories by dense similarity and
    /// creates `similar_to` edges to those at or above `threshold`. Never
    /// links a memory to itself.
    pub async fn auto_link(
        &self,
        memory_id: i64,
        scope: &Scope,
        threshold: f64,
        max_links: usize,
    ) -> MindstoreResult<Vec<i64>> {
        let Some(memory) = self.backend.get_memory(memory_id).await? else {
            return Ok(Vec::new());
        };
        let Some(embedding) = &memory.embedding else {
            return Ok(Vec::new());
        };

        let (collection, filter) = match scope {
            Scope::Project(id) => (Collection::Memories, Filter::eq_text("project_id", id)),
            Scope::Global => (Collection::GlobalMemories, Filter::Must(vec![])),
        };

        let candidates = self
            .vectors
            .search_dense(collection, embedding, &filter, max_links + 1, Some(threshold))
            .await?;

        let mut created = Vec::with_capacity(max_links);
        for candidate in candidates {
            if candidate.id == memory_id {
                continue;
            }
            if created.len() >= max_links {
                break;
            }
            let link = NewMemoryLink {
                source_id: memory_id,
                target_id: candidate.id,
                relation: RelationKind::SimilarTo,
                weight: candidate.score,
                valid_from: None,
                valid_until: None,
                llm_enriched: false,
            };
            let (id, _created) = self.backend.upsert_link(&link).await?;
            created.push(id);
        }
        Ok(created)
    }

    /// Breadth-first traversal over effective links, bounded by
    /// `max_depth` (default 2). Rebuilds the in-memory view from every
    /// link currently in storage; cheap relative to the graph sizes this
    /// system targets, and it guarantees the traversal never drifts from
    /// what invalidation has already applied.
    pub async fn find_connected(
        &self,
        memory_id: i64,
        max_depth: Option<u32>,
    ) -> MindstoreResult<Vec<ConnectedMemory>> {
        let links = self.backend.all_links().await?;
        let graph = IndexedGraph::from_links(&links);
        Ok(traversal::find_connected(
            &graph,
            memory_id,
            max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            Utc::now(),
        ))
    }

    pub async fn get_graph_stats(&self, scope: &Scope) -> MindstoreResult<GraphStats> {
        let memories = self.backend.all_memories(scope).await?;
        let links = self.backend.all_links().await?;
        let now = Utc::now();

        let effective: Vec<&MemoryLink> = links.iter().filter(|l| l.is_effective_at(now)).collect();
        let mut histogram: HashMap<RelationKind, usize> = HashMap::new();
        let mut touched: HashSet<i64> = HashSet::new();
        for link in &effective {
            *histogram.entry(link.relation).or_insert(0) += 1;
            touched.insert(link.source_id);
            touched.insert(link.target_id);
        }

        let total_memories = memories.len();
        let isolated_memory_count = memories.iter().filter(|m| !touched.contains(&m.id)).count();
        let avg_links_per_memory = if total_memories == 0 {
            0.0
        } else {
            (effective.len() as f64 * 2.0) / total_memories as f64
        };

        Ok(GraphStats {
            total_memories,
            total_effective_links: effective.len(),
            avg_links_per_memory,
            isolated_memory_count,
            relation_histogram: histogram,
        })
    }

    /// Recomputes degree centrality for every memory touched by at least
    /// one effective link and persists the normalized scores. Scheduled
    /// rather than incremental: each run reads the full link set once.
    pub async fn recompute_centrality(&self) -> MindstoreResult<usize> {
        let links = self.backend.all_links().await?;
        let now = Utc::now();

        let mut degree: HashMap<i64, u32> = HashMap::new();
        for link in links.iter().filter(|l| l.is_effective_at(now)) {
            *degree.entry(link.source_id).or_insert(0) += 1;
            *degree.entry(link.target_id).or_insert(0) += 1;
        }

        let max_degree = degree.values().copied().max().unwrap_or(0).max(1) as f64;
        let rows: Vec<Centrality> = degree
            .into_iter()
            .map(|(memory_id, degree)| Centrality {
                memory_id,
                degree,
                normalized_degree: degree as f64 / max_degree,
            })
            .collect();

        let count = rows.len();
        self.backend.upsert_centrality(&rows).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindstore_storage::EmbeddedBackend;
    use mindstore_vector::BuiltinVectorIndex;

    fn setup() -> MemoryGraph {
        let backend: Arc<dyn RelationalBackend> =
            Arc::new(EmbeddedBackend::open_in_memory().unwrap());
        let vectors: Arc<dyn VectorIndex> = Arc::new(BuiltinVectorIndex::new(backend.clone()));
        MemoryGraph::new(backend, vectors)
    }

    #[tokio::test]
    async fn create_link_rejects_self_link() {
        let graph = setup();
        let link = NewMemoryLink {
            source_id: 1,
            target_id: 1,
            relation: RelationKind::Related,
            weight: 1.0,
            valid_from: None,
            valid_until: None,
            llm_enriched: false,
        };
        assert!(graph.create_link(link).await.is_err());
    }

    #[tokio::test]
    async fn graph_stats_count_isolated_memories() {
        let graph = setup();
        let scope = Scope::Project("proj".into());
        let ids = graph
            .backend
            .insert_memories(
                &scope,
                &[
                    sample_memory("a"),
                    sample_memory("b"),
                    sample_memory("isolated"),
                ],
            )
            .await
            .unwrap();
        graph
            .create_link(NewMemoryLink {
                source_id: ids[0],
                target_id: ids[1],
                relation: RelationKind::Related,
                weight: 1.0,
                valid_from: None,
                valid_until: None,
                llm_enriched: false,
            })
            .await
            .unwrap();

        let stats = graph.get_graph_stats(&scope).await.unwrap();
        assert_eq!(stats.total_memories, 3);
        assert_eq!(stats.total_effective_links, 1);
        assert_eq!(stats.isolated_memory_count, 1);
    }

    fn sample_memory(content: &str) -> mindstore_core::traits::NewMemory {
        mindstore_core::traits::NewMemory {
            content: content.to_string(),
            tags: vec![],
            source: "test".into(),
            memory_type: mindstore_core::model::MemoryType::Observation,
            quality_score: 0.5,
            quality_factors: Default::default(),
            embedding: None,
            valid_from: None,
            valid_until: None,
        }
    }
}
