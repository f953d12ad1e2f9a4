use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::MindstoreResult;
use crate::model::{
    Centrality, Document, FileHash, GlobalMemory, LearningDelta, Memory, MemoryLink, SkillEntry,
    TokenFrequency, TokenStat, WebSearchEntry,
};

/// A project scope: either a specific, normalized project id or the
/// global (cross-project) namespace. Every per-project query applies this
/// as a case-insensitive filter; spec.md §4.3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Project(String),
    Global,
}

/// New-row payloads. Kept distinct from the persisted types (which carry
/// a backend-assigned `id`) the way the teacher's driver functions take
/// `&BaseMemory` for insert and return `id` separately — here the split is
/// explicit in the type instead of relying on callers to ignore `id`.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub file_path: String,
    pub chunk_index: u32,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct NewMemory {
    pub content: String,
    pub tags: Vec<String>,
    pub source: String,
    pub memory_type: crate::model::MemoryType,
    pub quality_score: f64,
    pub quality_factors: crate::model::QualityFactors,
    pub embedding: Option<Vec<f32>>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewMemoryLink {
    pub source_id: i64,
    pub target_id: i64,
    pub relation: crate::model::RelationKind,
    pub weight: f64,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub llm_enriched: bool,
}

/// One unified interface over the relational backend, with exactly two
/// implementations (embedded single-file engine, networked SQL server) —
/// spec.md §9 "two classes that differ only in which driver they forward
/// to". The dispatcher holds this as `Arc<dyn RelationalBackend>`.
#[async_trait]
pub trait RelationalBackend: Send + Sync {
    // --- documents ---
    async fn insert_documents(
        &self,
        scope: &Scope,
        docs: &[NewDocument],
    ) -> MindstoreResult<Vec<i64>>;
    async fn get_document(&self, id: i64) -> MindstoreResult<Option<Document>>;
    async fn get_documents(&self, ids: &[i64]) -> MindstoreResult<Vec<Document>>;
    async fn documents_by_path(&self, scope: &Scope, file_path: &str)
        -> MindstoreResult<Vec<Document>>;
    async fn delete_documents_by_path(
        &self,
        scope: &Scope,
        file_path: &str,
    ) -> MindstoreResult<Vec<i64>>;
    async fn all_documents(&self, scope: &Scope) -> MindstoreResult<Vec<Document>>;
    async fn clear_documents(&self, scope: &Scope) -> MindstoreResult<usize>;

    // --- file hashes ---
    async fn upsert_file_hash(&self, scope: &Scope, hash: &FileHash) -> MindstoreResult<()>;
    async fn all_file_hashes(&self, scope: &Scope) -> MindstoreResult<Vec<FileHash>>;
    async fn delete_file_hash(&self, scope: &Scope, file_path: &str) -> MindstoreResult<()>;

    // --- memories ---
    async fn insert_memories(
        &self,
        scope: &Scope,
        memories: &[NewMemory],
    ) -> MindstoreResult<Vec<i64>>;
    async fn get_memory(&self, id: i64) -> MindstoreResult<Option<Memory>>;
    async fn get_memories(&self, ids: &[i64]) -> MindstoreResult<Vec<Memory>>;
    async fn update_memory(&self, memory: &Memory) -> MindstoreResult<()>;
    async fn delete_memory(&self, id: i64) -> MindstoreResult<()>;
    async fn invalidate_memory(&self, id: i64, superseded_by: i64) -> MindstoreResult<()>;
    async fn restore_memory(&self, id: i64) -> MindstoreResult<()>;
    async fn bump_access(&self, id: i64, at: DateTime<Utc>) -> MindstoreResult<()>;
    async fn all_memories(&self, scope: &Scope) -> MindstoreResult<Vec<Memory>>;
    /// `global_memories` counterparts of `delete_memory`/`invalidate_memory`/
    /// `restore_memory`/`bump_access`. Kept as separate methods rather than
    /// threading a `Scope`/table argument through the project-scoped ones,
    /// matching `insert_global_memories`/`get_global_memory`/
    /// `all_global_memories`'s existing split — `memories` and
    /// `global_memories` have independent id sequences, so a caller must
    /// already know which table an id belongs to before calling either set.
    async fn update_global_memory(&self, memory: &Memory) -> MindstoreResult<()>;
    async fn delete_global_memory(&self, id: i64) -> MindstoreResult<()>;
    async fn invalidate_global_memory(&self, id: i64, superseded_by: i64) -> MindstoreResult<()>;
    async fn restore_global_memory(&self, id: i64) -> MindstoreResult<()>;
    async fn bump_global_access(&self, id: i64, at: DateTime<Utc>) -> MindstoreResult<()>;
    async fn cosine_search_memories(
        &self,
        scope: &Scope,
        embedding: &[f32],
        limit: usize,
    ) -> MindstoreResult<Vec<(Memory, f64)>>;

    // --- global memories (no project scope) ---
    async fn insert_global_memories(
        &self,
        memories: &[NewMemory],
    ) -> MindstoreResult<Vec<i64>>;
    async fn get_global_memory(&self, id: i64) -> MindstoreResult<Option<GlobalMemory>>;
    async fn all_global_memories(&self) -> MindstoreResult<Vec<GlobalMemory>>;

    // --- links ---
    async fn upsert_link(&self, link: &NewMemoryLink) -> MindstoreResult<(i64, bool)>;
    async fn get_link(
        &self,
        source_id: i64,
        target_id: i64,
        relation: crate::model::RelationKind,
    ) -> MindstoreResult<Option<MemoryLink>>;
    async fn links_for_memory(&self, memory_id: i64) -> MindstoreResult<Vec<MemoryLink>>;
    async fn invalidate_link(
        &self,
        source_id: i64,
        target_id: i64,
        relation: crate::model::RelationKind,
        at: DateTime<Utc>,
    ) -> MindstoreResult<()>;
    async fn all_links(&self) -> MindstoreResult<Vec<MemoryLink>>;

    // --- centrality ---
    async fn upsert_centrality(&self, rows: &[Centrality]) -> MindstoreResult<()>;
    async fn get_centrality(&self, memory_id: i64) -> MindstoreResult<Option<Centrality>>;
    async fn all_centrality(&self) -> MindstoreResult<Vec<Centrality>>;

    // --- token frequency / stats (lexical observability) ---
    async fn record_token_frequencies(&self, rows: &[TokenFrequency]) -> MindstoreResult<()>;
    async fn upsert_token_stats(&self, rows: &[TokenStat]) -> MindstoreResult<()>;
    async fn all_token_stats(&self, scope: &str) -> MindstoreResult<Vec<TokenStat>>;
    /// Every token-frequency row across every scope, used only by bulk
    /// export (spec.md §4.9 lists `token_frequencies` as a top-level
    /// envelope array, unscoped).
    async fn all_token_frequencies(&self) -> MindstoreResult<Vec<TokenFrequency>>;
    /// Every token-stats row across every scope; same export-only purpose
    /// as `all_token_frequencies`.
    async fn all_token_stats_every_scope(&self) -> MindstoreResult<Vec<TokenStat>>;

    // --- learning deltas ---
    async fn append_learning_delta(&self, delta: &LearningDelta) -> MindstoreResult<i64>;
    async fn recent_learning_deltas(&self, limit: usize) -> MindstoreResult<Vec<LearningDelta>>;

    // --- web-search history / skills: opaque JSON payload + timestamp +
    // project filter, same shape as a `LearningDelta` journal row. The RPC
    // surface that would populate these richly is out of scope; see
    // DESIGN.md for the shape decision. ---
    async fn record_web_search(&self, scope: &Scope, payload: serde_json::Value) -> MindstoreResult<i64>;
    async fn recent_web_searches(&self, scope: &Scope, limit: usize) -> MindstoreResult<Vec<WebSearchEntry>>;
    async fn record_skill(&self, scope: &Scope, payload: serde_json::Value) -> MindstoreResult<i64>;
    async fn all_skills(&self, scope: &Scope) -> MindstoreResult<Vec<SkillEntry>>;

    // --- bulk transfer (C9) ---
    /// Destructive: clears the scope's tables, then reinserts, preserving
    /// relative order but not original ids. Returns `old_id -> new_id`.
    async fn restore_documents(
        &self,
        scope: &Scope,
        docs: &[Document],
        destructive: bool,
    ) -> MindstoreResult<std::collections::HashMap<i64, i64>>;
    async fn restore_memories(
        &self,
        scope: &Scope,
        memories: &[Memory],
        destructive: bool,
    ) -> MindstoreResult<std::collections::HashMap<i64, i64>>;
    async fn restore_links(
        &self,
        links: &[MemoryLink],
        id_map: &std::collections::HashMap<i64, i64>,
    ) -> MindstoreResult<()>;

    // --- maintenance ---
    async fn vacuum(&self) -> MindstoreResult<()>;
}
