//! The embedded, single-file SQLite driver — one of the two
//! `RelationalBackend` implementations, the other being [`crate::networked`].
//! Owns a [`ConnectionPool`] and forwards every trait method to the sync
//! `rusqlite` query functions in [`crate::queries`]. rusqlite calls are
//! local-disk and fast enough that routing them through `spawn_blocking`
//! would only add overhead; they run directly inside the async fn bodies.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mindstore_core::errors::MindstoreResult;
use mindstore_core::model::{
    Centrality, Document, FileHash, GlobalMemory, LearningDelta, Memory, MemoryLink,
    RelationKind, SkillEntry, TokenFrequency, TokenStat, WebSearchEntry,
};
use mindstore_core::traits::{NewDocument, NewMemory, NewMemoryLink, RelationalBackend, Scope};

use crate::migrations::run_migrations;
use crate::pool::ConnectionPool;
use crate::queries::{bulk, documents, links, maintenance, memories, misc};

pub struct EmbeddedBackend {
    pool: ConnectionPool,
    /// In-memory databases can't share state across connections, so reads
    /// route through the same writer connection instead of the (isolated)
    /// read pool.
    use_read_pool: bool,
}

impl EmbeddedBackend {
    pub fn open(path: impl AsRef<Path>, busy_timeout_ms: u64) -> MindstoreResult<Self> {
        let pool = ConnectionPool::open(path.as_ref(), busy_timeout_ms)?;
        pool.writer.with_conn(run_migrations)?;
        Ok(Self {
            pool,
            use_read_pool: true,
        })
    }

    pub fn open_in_memory() -> MindstoreResult<Self> {
        let pool = ConnectionPool::open_in_memory()?;
        pool.writer.with_conn(run_migrations)?;
        Ok(Self {
            pool,
            use_read_pool: false,
        })
    }

    fn with_reader<F, T>(&self, f: F) -> MindstoreResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> MindstoreResult<T>,
    {
        if self.use_read_pool {
            self.pool.readers.with_conn(f)
        } else {
            self.pool.writer.with_conn(f)
        }
    }

    fn memory_table(scope: &Scope) -> &'static str {
        match scope {
            Scope::Project(_) => "memories",
            Scope::Global => "global_memories",
        }
    }
}

#[async_trait]
impl RelationalBackend for EmbeddedBackend {
    async fn insert_documents(&self, scope: &Scope, docs: &[NewDocument]) -> MindstoreResult<Vec<i64>> {
        self.pool.writer.with_conn(|c| documents::insert_documents(c, scope, docs))
    }

    async fn get_document(&self, id: i64) -> MindstoreResult<Option<Document>> {
        self.with_reader(|c| documents::get_document(c, id))
    }

    async fn get_documents(&self, ids: &[i64]) -> MindstoreResult<Vec<Document>> {
        self.with_reader(|c| documents::get_documents(c, ids))
    }

    async fn documents_by_path(&self, scope: &Scope, file_path: &str) -> MindstoreResult<Vec<Document>> {
        self.with_reader(|c| documents::documents_by_path(c, scope, file_path))
    }

    async fn delete_documents_by_path(&self, scope: &Scope, file_path: &str) -> MindstoreResult<Vec<i64>> {
        self.pool
            .writer
            .with_conn(|c| documents::delete_documents_by_path(c, scope, file_path))
    }

    async fn all_documents(&self, scope: &Scope) -> MindstoreResult<Vec<Document>> {
        self.with_reader(|c| documents::all_documents(c, scope))
    }

    async fn clear_documents(&self, scope: &Scope) -> MindstoreResult<usize> {
        self.pool.writer.with_conn(|c| documents::clear_documents(c, scope))
    }

    async fn upsert_file_hash(&self, scope: &Scope, hash: &FileHash) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| documents::upsert_file_hash(c, scope, hash))
    }

    async fn all_file_hashes(&self, scope: &Scope) -> MindstoreResult<Vec<FileHash>> {
        self.with_reader(|c| documents::all_file_hashes(c, scope))
    }

    async fn delete_file_hash(&self, scope: &Scope, file_path: &str) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| documents::delete_file_hash(c, scope, file_path))
    }

    async fn insert_memories(&self, scope: &Scope, new_memories: &[NewMemory]) -> MindstoreResult<Vec<i64>> {
        let table = Self::memory_table(scope);
        self.pool
            .writer
            .with_conn(|c| memories::insert_memories(c, table, Some(scope), new_memories))
    }

    async fn get_memory(&self, id: i64) -> MindstoreResult<Option<Memory>> {
        self.with_reader(|c| memories::get_memory(c, "memories", id))
    }

    async fn get_memories(&self, ids: &[i64]) -> MindstoreResult<Vec<Memory>> {
        self.with_reader(|c| memories::get_memories(c, "memories", ids))
    }

    async fn update_memory(&self, memory: &Memory) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| memories::update_memory(c, "memories", memory))
    }

    async fn delete_memory(&self, id: i64) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| memories::delete_memory(c, "memories", id))
    }

    async fn invalidate_memory(&self, id: i64, superseded_by: i64) -> MindstoreResult<()> {
        self.pool
            .writer
            .with_conn(|c| memories::invalidate_memory(c, "memories", id, superseded_by))
    }

    async fn restore_memory(&self, id: i64) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| memories::restore_memory(c, "memories", id))
    }

    async fn bump_access(&self, id: i64, at: DateTime<Utc>) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| memories::bump_access(c, "memories", id, at))
    }

    async fn all_memories(&self, scope: &Scope) -> MindstoreResult<Vec<Memory>> {
        self.with_reader(|c| memories::all_memories(c, "memories", Some(scope)))
    }

    async fn update_global_memory(&self, memory: &Memory) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| memories::update_memory(c, "global_memories", memory))
    }

    async fn delete_global_memory(&self, id: i64) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| memories::delete_memory(c, "global_memories", id))
    }

    async fn invalidate_global_memory(&self, id: i64, superseded_by: i64) -> MindstoreResult<()> {
        self.pool
            .writer
            .with_conn(|c| memories::invalidate_memory(c, "global_memories", id, superseded_by))
    }

    async fn restore_global_memory(&self, id: i64) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| memories::restore_memory(c, "global_memories", id))
    }

    async fn bump_global_access(&self, id: i64, at: DateTime<Utc>) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| memories::bump_access(c, "global_memories", id, at))
    }

    async fn cosine_search_memories(&self, scope: &Scope, embedding: &[f32], limit: usize) -> MindstoreResult<Vec<(Memory, f64)>> {
        self.with_reader(|c| memories::cosine_search_memories(c, "memories", Some(scope), embedding, limit))
    }

    async fn insert_global_memories(&self, new_memories: &[NewMemory]) -> MindstoreResult<Vec<i64>> {
        self.pool
            .writer
            .with_conn(|c| memories::insert_memories(c, "global_memories", None, new_memories))
    }

    async fn get_global_memory(&self, id: i64) -> MindstoreResult<Option<GlobalMemory>> {
        self.with_reader(|c| memories::get_memory(c, "global_memories", id))
            .map(|opt| opt.map(GlobalMemory))
    }

    async fn all_global_memories(&self) -> MindstoreResult<Vec<GlobalMemory>> {
        self.with_reader(|c| memories::all_memories(c, "global_memories", None))
            .map(|v| v.into_iter().map(GlobalMemory).collect())
    }

    async fn upsert_link(&self, link: &NewMemoryLink) -> MindstoreResult<(i64, bool)> {
        self.pool.writer.with_conn(|c| links::upsert_link(c, link))
    }

    async fn get_link(&self, source_id: i64, target_id: i64, relation: RelationKind) -> MindstoreResult<Option<MemoryLink>> {
        self.with_reader(|c| links::get_link(c, source_id, target_id, relation))
    }

    async fn links_for_memory(&self, memory_id: i64) -> MindstoreResult<Vec<MemoryLink>> {
        self.with_reader(|c| links::links_for_memory(c, memory_id))
    }

    async fn invalidate_link(&self, source_id: i64, target_id: i64, relation: RelationKind, at: DateTime<Utc>) -> MindstoreResult<()> {
        self.pool
            .writer
            .with_conn(|c| links::invalidate_link(c, source_id, target_id, relation, at))
    }

    async fn all_links(&self) -> MindstoreResult<Vec<MemoryLink>> {
        self.with_reader(links::all_links)
    }

    async fn upsert_centrality(&self, rows: &[Centrality]) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| misc::upsert_centrality(c, rows))
    }

    async fn get_centrality(&self, memory_id: i64) -> MindstoreResult<Option<Centrality>> {
        self.with_reader(|c| misc::get_centrality(c, memory_id))
    }

    async fn all_centrality(&self) -> MindstoreResult<Vec<Centrality>> {
        self.with_reader(misc::all_centrality)
    }

    async fn record_token_frequencies(&self, rows: &[TokenFrequency]) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| misc::record_token_frequencies(c, rows))
    }

    async fn upsert_token_stats(&self, rows: &[TokenStat]) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| misc::upsert_token_stats(c, rows))
    }

    async fn all_token_stats(&self, scope: &str) -> MindstoreResult<Vec<TokenStat>> {
        self.with_reader(|c| misc::all_token_stats(c, scope))
    }

    async fn all_token_frequencies(&self) -> MindstoreResult<Vec<TokenFrequency>> {
        self.with_reader(misc::all_token_frequencies)
    }

    async fn all_token_stats_every_scope(&self) -> MindstoreResult<Vec<TokenStat>> {
        self.with_reader(misc::all_token_stats_every_scope)
    }

    async fn append_learning_delta(&self, delta: &LearningDelta) -> MindstoreResult<i64> {
        self.pool.writer.with_conn(|c| misc::append_learning_delta(c, delta))
    }

    async fn recent_learning_deltas(&self, limit: usize) -> MindstoreResult<Vec<LearningDelta>> {
        self.with_reader(|c| misc::recent_learning_deltas(c, limit))
    }

    async fn record_web_search(&self, scope: &Scope, payload: serde_json::Value) -> MindstoreResult<i64> {
        self.pool.writer.with_conn(|c| misc::record_journal_entry(c, "web_search_history", scope, &payload))
    }

    async fn recent_web_searches(&self, scope: &Scope, limit: usize) -> MindstoreResult<Vec<WebSearchEntry>> {
        self.with_reader(|c| misc::recent_journal_entries_web_search(c, scope, limit))
    }

    async fn record_skill(&self, scope: &Scope, payload: serde_json::Value) -> MindstoreResult<i64> {
        self.pool.writer.with_conn(|c| misc::record_journal_entry(c, "skills", scope, &payload))
    }

    async fn all_skills(&self, scope: &Scope) -> MindstoreResult<Vec<SkillEntry>> {
        self.with_reader(|c| misc::all_journal_entries_skills(c, scope))
    }

    async fn restore_documents(&self, scope: &Scope, docs: &[Document], destructive: bool) -> MindstoreResult<HashMap<i64, i64>> {
        self.pool.writer.with_conn(|c| bulk::restore_documents(c, scope, docs, destructive))
    }

    async fn restore_memories(&self, scope: &Scope, restore_rows: &[Memory], destructive: bool) -> MindstoreResult<HashMap<i64, i64>> {
        let table = Self::memory_table(scope);
        self.pool
            .writer
            .with_conn(|c| bulk::restore_memories(c, table, scope, restore_rows, destructive))
    }

    async fn restore_links(&self, restore_rows: &[MemoryLink], id_map: &HashMap<i64, i64>) -> MindstoreResult<()> {
        self.pool.writer.with_conn(|c| bulk::restore_links(c, restore_rows, id_map))
    }

    async fn vacuum(&self) -> MindstoreResult<()> {
        self.pool.writer.with_conn(maintenance::vacuum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindstore_core::model::MemoryType;

    fn sample_memory() -> NewMemory {
        NewMemory {
            content: "saw a race condition in the flush path".into(),
            tags: vec!["concurrency".into()],
            source: "test".into(),
            memory_type: MemoryType::Observation,
            quality_score: 0.7,
            quality_factors: Default::default(),
            embedding: Some(vec![1.0, 0.0, 0.0]),
            valid_from: None,
            valid_until: None,
        }
    }

    #[tokio::test]
    async fn round_trips_a_memory() {
        let backend = EmbeddedBackend::open_in_memory().unwrap();
        let scope = Scope::Project("proj".into());
        let ids = backend.insert_memories(&scope, &[sample_memory()]).await.unwrap();
        let fetched = backend.get_memory(ids[0]).await.unwrap().unwrap();
        assert_eq!(fetched.content, "saw a race condition in the flush path");
    }

    #[tokio::test]
    async fn global_memories_are_isolated_from_project_memories() {
        let backend = EmbeddedBackend::open_in_memory().unwrap();
        let scope = Scope::Project("proj".into());
        backend.insert_memories(&scope, &[sample_memory()]).await.unwrap();
        let global_ids = backend.insert_global_memories(&[sample_memory()]).await.unwrap();
        assert!(backend.get_memory(global_ids[0]).await.unwrap().is_none());
        assert!(backend.get_global_memory(global_ids[0]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalidate_then_restore_round_trips() {
        let backend = EmbeddedBackend::open_in_memory().unwrap();
        let scope = Scope::Project("proj".into());
        let ids = backend.insert_memories(&scope, &[sample_memory()]).await.unwrap();
        let ids2 = backend.insert_memories(&scope, &[sample_memory()]).await.unwrap();
        backend.invalidate_memory(ids[0], ids2[0]).await.unwrap();
        let invalidated = backend.get_memory(ids[0]).await.unwrap().unwrap();
        assert_eq!(invalidated.invalidated_by, Some(ids2[0]));
        backend.restore_memory(ids[0]).await.unwrap();
        let restored = backend.get_memory(ids[0]).await.unwrap().unwrap();
        assert_eq!(restored.invalidated_by, None);
    }

    #[tokio::test]
    async fn web_search_history_and_skills_are_scoped_by_project() {
        let backend = EmbeddedBackend::open_in_memory().unwrap();
        let acme = Scope::Project("acme".into());
        let widgets = Scope::Project("widgets".into());

        backend.record_web_search(&acme, serde_json::json!({"query": "how does rustls verify certs"})).await.unwrap();
        backend.record_web_search(&widgets, serde_json::json!({"query": "tokio select macro"})).await.unwrap();
        backend.record_web_search(&Scope::Global, serde_json::json!({"query": "rust async book"})).await.unwrap();

        let acme_hits = backend.recent_web_searches(&acme, 10).await.unwrap();
        assert_eq!(acme_hits.len(), 1);
        assert_eq!(acme_hits[0].payload["query"], "how does rustls verify certs");

        let global_hits = backend.recent_web_searches(&Scope::Global, 10).await.unwrap();
        assert_eq!(global_hits.len(), 1);

        backend.record_skill(&acme, serde_json::json!({"name": "flush-path retry"})).await.unwrap();
        let acme_skills = backend.all_skills(&acme).await.unwrap();
        assert_eq!(acme_skills.len(), 1);
        assert!(backend.all_skills(&widgets).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn self_link_is_rejected() {
        let backend = EmbeddedBackend::open_in_memory().unwrap();
        let scope = Scope::Project("proj".into());
        let ids = backend.insert_memories(&scope, &[sample_memory()]).await.unwrap();
        let link = NewMemoryLink {
            source_id: ids[0],
            target_id: ids[0],
            relation: RelationKind::Related,
            weight: 1.0,
            valid_from: None,
            valid_until: None,
            llm_enriched: false,
        };
        assert!(backend.upsert_link(&link).await.is_err());
    }
}
