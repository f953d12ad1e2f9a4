use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::MindstoreResult;
use crate::traits::filter::Filter;

/// The three collections the vector engine carries (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Documents,
    Memories,
    GlobalMemories,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Memories => "memories",
            Self::GlobalMemories => "global_memories",
        }
    }
}

/// Opaque JSON payload stored/returned alongside each vector point.
pub type Payload = serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorUpsert {
    pub id: i64,
    pub dense: Vec<f32>,
    /// Raw text handed to the engine's server-side lexical model. `None`
    /// for a dense-only upsert (old single-vector schema, or builtin mode).
    pub lexical_text: Option<String>,
    pub payload: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: i64,
    pub score: f64,
    pub payload: Payload,
}

/// Unified interface over the dense-similarity index: either the
/// relational engine's brute-force built-in mode, or a networked external
/// engine that also scores lexically and fuses server-side.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if absent. Detects an outdated single-vector
    /// schema and recreates with the multi-vector (dense + sparse) schema,
    /// returning `true` if a re-index warning should be surfaced.
    async fn ensure_collection(&self, collection: Collection, dims: usize) -> MindstoreResult<bool>;

    async fn upsert(&self, collection: Collection, point: VectorUpsert) -> MindstoreResult<()>;
    async fn upsert_batch(
        &self,
        collection: Collection,
        points: &[VectorUpsert],
    ) -> MindstoreResult<()>;

    async fn delete(&self, collection: Collection, ids: &[i64]) -> MindstoreResult<()>;

    async fn search_dense(
        &self,
        collection: Collection,
        vector: &[f32],
        filter: &Filter,
        k: usize,
        score_threshold: Option<f64>,
    ) -> MindstoreResult<Vec<ScoredPoint>>;

    /// Two-lane fused search (lexical top `3k`, dense top `3k`, RRF-fused
    /// server-side). Only available when the collection carries the
    /// hybrid (dense + sparse) schema — callers check
    /// [`VectorIndex::supports_hybrid`] first and fall back otherwise.
    async fn hybrid_search(
        &self,
        collection: Collection,
        text: &str,
        vector: &[f32],
        filter: &Filter,
        k: usize,
        score_threshold: Option<f64>,
    ) -> MindstoreResult<Vec<ScoredPoint>>;

    /// Whether this adapter/collection can run [`VectorIndex::hybrid_search`].
    fn supports_hybrid(&self, collection: Collection) -> bool;

    /// Dense-only nearest neighbor with full payload, used by the dedup
    /// primitive (`findSimilarWithContent`). Takes the same filter as
    /// [`VectorIndex::search_dense`] so dedup stays scoped to one project
    /// instead of matching across every project sharing the collection.
    async fn find_similar(
        &self,
        collection: Collection,
        vector: &[f32],
        filter: &Filter,
        threshold: f64,
    ) -> MindstoreResult<Option<ScoredPoint>>;
}
