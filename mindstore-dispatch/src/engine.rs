//! `Engine`: the single entry point (spec.md §4.5, component C5). Holds
//! the chosen relational driver, the chosen vector mode, the lexical
//! index, the memory graph, and the hybrid search orchestrator, wiring
//! every write path's dedup/sync/counter bookkeeping in one place —
//! matching the teacher's own `cortex-session` crate, which is similarly
//! the only crate in its workspace depending on every other subsystem at
//! once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use mindstore_core::errors::{MindstoreError, MindstoreResult, ValidationError};
use mindstore_core::model::{Document, FileHash, LearningDelta, Memory, MemoryType, SessionCounters};
use mindstore_core::traits::filter::Filter;
use mindstore_core::traits::vector::{Collection, VectorIndex, VectorUpsert};
use mindstore_core::traits::{NewDocument, NewMemory, NewMemoryLink, RelationalBackend, Scope};
use mindstore_core::MindstoreConfig;
use mindstore_graph::{GraphStats, MemoryGraph};
use mindstore_lexical::LexicalIndex;
use mindstore_retrieval::{DocumentSearchRequest, DocumentSearchResponse, SearchEngine, SearchRequest, SearchResponse};
use mindstore_storage::freshness::FreshnessReport;
use mindstore_storage::transfer::{self, BackfillReport, BackfillTarget, Envelope, ImportResult};

use crate::cancellation::guard;
use crate::counters::CounterHandle;

fn collection_for(scope: &Scope) -> Collection {
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


/// `invalidated_by is null`, plus a project-or-global clause for project
/// scope. Narrower than `mindstore_retrieval::filter_builder::build` —
/// dedup has no `since`/validity-at-T concept of its own.
fn dedup_filter(scope: &Scope) -> Filter {
    match scope {
        Scope::Project(id) => Filter::must([
            Filter::is_null("invalidated_by"),
            Filter::should([Filter::eq_text("project_id", id.clone()), Filter::is_null("project_id")]),
        ]),
        Scope::Global => Filter::is_null("invalidated_by"),
    }
}

fn build_memory(id: i64, item: &NewMemory, now: DateTime<Utc>) -> Memory {
    Memory {
        id,
        content: item.content.clone(),
        tags: item.tags.clone(),
        source: item.source.clone(),
        memory_type: item.memory_type,
        quality_score: item.quality_score,
        quality_factors: item.quality_factors.clone(),
        embedding: item.embedding.clone(),
        access_count: 0,
        last_accessed: now,
        valid_from: item.valid_from,
        valid_until: item.valid_until,
        created_at: now,
        invalidated_by: None,
    }
}

fn build_document(id: i64, item: &NewDocument, now: DateTime<Utc>) -> Document {
    Document {
        id,
        file_path: item.file_path.clone(),
        chunk_index: item.chunk_index,
        content: item.content.clone(),
        start_line: item.start_line,
        end_line: item.end_line,
        embedding: item.embedding.clone(),
        created_at: now,
        updated_at: now,
    }
}

#[derive(Debug, Clone)]
pub struct SaveMemoryOptions {
    pub memory_type: MemoryType,
    /// `None` defers to `retention.default_quality_score`.
    pub quality_score: Option<f64>,
    pub deduplicate: bool,
    pub dedup_threshold: f32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl SaveMemoryOptions {
    pub fn new(memory_type: MemoryType) -> Self {
        Self {
            memory_type,
            quality_score: None,
            deduplicate: true,
            dedup_threshold: mindstore_core::constants::DEDUP_SIMILARITY_THRESHOLD,
            valid_from: None,
            valid_until: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveMemoryResult {
    pub id: i64,
    pub created: bool,
    pub duplicate_of: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SaveMemoriesBatchResult {
    pub created: Vec<i64>,
    /// `(index into the input list, id of the existing memory it duplicates)`.
    pub duplicates: Vec<(usize, i64)>,
}

pub struct Engine {
    backend: Arc<dyn RelationalBackend>,
    vectors: Arc<dyn VectorIndex>,
    lexical: Arc<LexicalIndex>,
    graph: MemoryGraph,
    search_engine: SearchEngine,
    config: MindstoreConfig,
    counters: CounterHandle,
}

impl Engine {
    pub fn new(
        backend: Arc<dyn RelationalBackend>,
        vectors: Arc<dyn VectorIndex>,
        lexical: Arc<LexicalIndex>,
        config: MindstoreConfig,
    ) -> Self {
        let graph = MemoryGraph::new(backend.clone(), vectors.clone());
        let search_engine = SearchEngine::new(backend.clone(), vectors.clone(), lexical.clone(), &config);
        Self {
            backend,
            vectors,
            lexical,
            graph,
            search_engine,
            config,
            counters: CounterHandle::new(),
        }
    }

    // ---------------------------------------------------------------
    // Dedup primitive (findSimilar, C4-backed)
    // ---------------------------------------------------------------

    async fn resolve_memory(&self, scope: &Scope, id: i64) -> MindstoreResult<Option<Memory>> {
        match scope {
            Scope::Project(_) => self.backend.get_memory(id).await,
            Scope::Global => Ok(self.backend.get_global_memory(id).await?.map(|gm| gm.0)),
        }
    }

    /// Falls back to the relational driver's own cosine scan when the
    /// vector engine reports an outdated (dense-only) schema. Only wired
    /// for project scope: the backend's `cosine_search_memories` queries
    /// the `memories` table specifically and has no `global_memories`
    /// equivalent (see DESIGN.md) — a global dedup miss on that fallback
    /// path degrades to "no duplicate found" rather than erroring.
    async fn find_similar_via_relational_cosine(
        &self,
        scope: &Scope,
        embedding: &[f32],
        threshold: f32,
    ) -> MindstoreResult<Option<Memory>> {
        let Scope::Project(_) = scope else {
            return Ok(None);
        };
        let matches = self.backend.cosine_search_memories(scope, embedding, 1).await?;
        Ok(matches
            .into_iter()
            .find(|(_, score)| *score as f32 >= threshold)
            .map(|(memory, _)| memory))
    }

    async fn find_similar_memory(
        &self,
        scope: &Scope,
        embedding: &[f32],
        threshold: f32,
    ) -> MindstoreResult<Option<Memory>> {
        let collection = collection_for(scope);
        let filter = dedup_filter(scope);
        match self.vectors.find_similar(collection, embedding, &filter, threshold as f64).await {
            Ok(Some(point)) => self.resolve_memory(scope, point.id).await,
            Ok(None) => Ok(None),
            Err(MindstoreError::Unsupported(_)) => {
                self.find_similar_via_relational_cosine(scope, embedding, threshold).await
            }
            Err(e) => Err(e),
        }
    }

    /// The dedup primitive exposed as its own operation (spec.md §4.5).
    pub async fn find_similar(
        &self,
        scope: Scope,
        embedding: Vec<f32>,
        threshold: f32,
        token: &CancellationToken,
    ) -> MindstoreResult<Option<Memory>> {
        guard(token, self.find_similar_memory(&scope, &embedding, threshold)).await
    }

    // ---------------------------------------------------------------
    // Vector/lexical sync helpers
    // ---------------------------------------------------------------

    async fn sync_memories_to_vector(&self, scope: &Scope, memories: &[Memory]) {
        let collection = collection_for(scope);
        let hybrid = self.vectors.supports_hybrid(collection);
        let points: Vec<VectorUpsert> = memories
            .iter()
            .filter_map(|m| {
                let dense = m.embedding.clone()?;
                Some(VectorUpsert {
                    id: m.id,
                    dense,
                    lexical_text: hybrid.then(|| m.content.clone()),
                    payload: mindstore_vector::payload::memory_payload(m, scope),
                })
            })
            .collect();
        if points.is_empty() {
            return;
        }
        if let Err(e) = self.vectors.upsert_batch(collection, &points).await {
            warn!(error = %e, count = points.len(), "drift: vector upsert failed after a relational memory write");
        }
    }

    async fn sync_documents_to_vector(&self, scope: &Scope, rows: &[Document]) {
        let points: Vec<VectorUpsert> = rows
            .iter()
            .filter_map(|d| {
                let dense = d.embedding.clone()?;
                Some(VectorUpsert {
                    id: d.id,
                    dense,
                    lexical_text: Some(d.content.clone()),
                    payload: mindstore_vector::payload::document_payload(d, scope),
                })
            })
            .collect();
        if points.is_empty() {
            return;
        }
        if let Err(e) = self.vectors.upsert_batch(Collection::Documents, &points).await {
            warn!(error = %e, count = points.len(), "drift: vector upsert failed after a relational document write");
        }
    }

    /// Rebuilds a scope's lexical index from the relational store if
    /// it's been marked dirty since the last search. This crate is the
    /// only one holding both a [`LexicalIndex`] and a
    /// [`RelationalBackend`], so the rebuild lives here.
    async fn ensure_lexical_fresh(&self, scope: &Scope) -> MindstoreResult<()> {
        let lex_scope = lexical_scope(scope);
        if !self.lexical.is_dirty(lex_scope) {
            return Ok(());
        }
        let rows: Vec<(i64, String)> = match scope {
            Scope::Project(_) => self
                .backend
                .all_memories(scope)
                .await?
                .into_iter()
                .map(|m| (m.id, m.content))
                .collect(),
            Scope::Global => self
                .backend
                .all_global_memories()
                .await?
                .into_iter()
                .map(|gm| (gm.0.id, gm.0.content))
                .collect(),
        };
        self.lexical.build(lex_scope, &rows);
        Ok(())
    }

    async fn ensure_document_lexical_fresh(&self, project_id: &str, code: bool) -> MindstoreResult<()> {
        let lex_scope = if code {
            mindstore_lexical::Scope::ProjectCode
        } else {
            mindstore_lexical::Scope::ProjectDocs
        };
        if !self.lexical.is_dirty(lex_scope) {
            return Ok(());
        }
        let rows: Vec<(i64, String)> = self
            .backend
            .all_documents(&Scope::Project(project_id.to_string()))
            .await?
            .into_iter()
            .filter(|d| d.is_code() == code)
            .map(|d| (d.id, d.content))
            .collect();
        self.lexical.build(lex_scope, &rows);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Write paths (spec.md §4.5)
    // ---------------------------------------------------------------

    pub async fn save_memory(
        &self,
        scope: Scope,
        content: String,
        embedding: Option<Vec<f32>>,
        tags: Vec<String>,
        source: String,
        opts: SaveMemoryOptions,
        token: &CancellationToken,
    ) -> MindstoreResult<SaveMemoryResult> {
        guard(token, async {
            if content.trim().is_empty() {
                return Err(ValidationError::EmptyContent.into());
            }

            if opts.deduplicate {
                if let Some(embedding) = &embedding {
                    if let Some(existing) = self.find_similar_memory(&scope, embedding, opts.dedup_threshold).await? {
                        self.counters.record_duplicate();
                        return Ok(SaveMemoryResult {
                            id: existing.id,
                            created: false,
                            duplicate_of: Some(existing.id),
                        });
                    }
                }
            }

            let memory_type = opts.memory_type;
            let item = NewMemory {
                content,
                tags,
                source,
                memory_type,
                quality_score: opts.quality_score.unwrap_or(self.config.retention.default_quality_score),
                quality_factors: Default::default(),
                embedding,
                valid_from: opts.valid_from,
                valid_until: opts.valid_until,
            };

            let id = match &scope {
                Scope::Project(_) => self.backend.insert_memories(&scope, std::slice::from_ref(&item)).await?[0],
                Scope::Global => self.backend.insert_global_memories(std::slice::from_ref(&item)).await?[0],
            };

            let now = Utc::now();
            let memory = build_memory(id, &item, now);
            self.sync_memories_to_vector(&scope, std::slice::from_ref(&memory)).await;
            self.lexical.add(lexical_scope(&scope), id, &memory.content);
            self.counters.record_memory_created(memory_type);

            Ok(SaveMemoryResult {
                id,
                created: true,
                duplicate_of: None,
            })
        })
        .await
    }

    pub async fn save_memories_batch(
        &self,
        scope: Scope,
        items: Vec<NewMemory>,
        dedup_threshold: f32,
        token: &CancellationToken,
    ) -> MindstoreResult<SaveMemoriesBatchResult> {
        guard(token, async {
            let mut to_insert = Vec::with_capacity(items.len());
            let mut duplicates = Vec::new();

            for (index, item) in items.into_iter().enumerate() {
                let existing = match &item.embedding {
                    Some(embedding) => self.find_similar_memory(&scope, embedding, dedup_threshold).await?,
                    None => None,
                };
                match existing {
                    Some(memory) => {
                        self.counters.record_duplicate();
                        duplicates.push((index, memory.id));
                    }
                    None => to_insert.push(item),
                }
            }

            if to_insert.is_empty() {
                return Ok(SaveMemoriesBatchResult {
                    created: Vec::new(),
                    duplicates,
                });
            }

            let ids = match &scope {
                Scope::Project(_) => self.backend.insert_memories(&scope, &to_insert).await?,
                Scope::Global => self.backend.insert_global_memories(&to_insert).await?,
            };

            let now = Utc::now();
            let memories: Vec<Memory> = ids.iter().zip(to_insert.iter()).map(|(&id, item)| build_memory(id, item, now)).collect();

            self.sync_memories_to_vector(&scope, &memories).await;
            for memory in &memories {
                self.lexical.add(lexical_scope(&scope), memory.id, &memory.content);
                self.counters.record_memory_created(memory.memory_type);
            }

            Ok(SaveMemoriesBatchResult { created: ids, duplicates })
        })
        .await
    }

    pub async fn upsert_documents_batch(
        &self,
        scope: Scope,
        documents: Vec<NewDocument>,
        token: &CancellationToken,
    ) -> MindstoreResult<Vec<i64>> {
        guard(token, async {
            let ids = self.backend.insert_documents(&scope, &documents).await?;
            let now = Utc::now();
            let rows: Vec<Document> = ids.iter().zip(documents.iter()).map(|(&id, d)| build_document(id, d, now)).collect();
            self.sync_documents_to_vector(&scope, &rows).await;
            Ok(ids)
        })
        .await
    }

    /// The hashed variant (spec.md §4.5): supersedes any chunks already
    /// indexed at `file_path` before inserting the new ones, then records
    /// the content hash the freshness detector compares against later.
    pub async fn upsert_documents_batch_hashed(
        &self,
        scope: Scope,
        file_path: String,
        content_hash: String,
        documents: Vec<NewDocument>,
        token: &CancellationToken,
    ) -> MindstoreResult<Vec<i64>> {
        guard(token, async {
            let superseded = self.backend.delete_documents_by_path(&scope, &file_path).await?;
            if !superseded.is_empty() {
                if let Err(e) = self.vectors.delete(Collection::Documents, &superseded).await {
                    warn!(error = %e, file_path = %file_path, "drift: vector delete failed for superseded document chunks");
                }
            }

            let ids = self.backend.insert_documents(&scope, &documents).await?;
            let now = Utc::now();
            let rows: Vec<Document> = ids.iter().zip(documents.iter()).map(|(&id, d)| build_document(id, d, now)).collect();
            self.sync_documents_to_vector(&scope, &rows).await;

            self.backend
                .upsert_file_hash(
                    &scope,
                    &FileHash {
                        file_path,
                        content_hash,
                        indexed_at: now,
                    },
                )
                .await?;

            Ok(ids)
        })
        .await
    }

    /// Flips `invalidated_by` and re-upserts the vector payload so
    /// subsequent filters exclude the row (spec.md §4.5).
    pub async fn invalidate_memory(
        &self,
        scope: Scope,
        id: i64,
        superseded_by: i64,
        token: &CancellationToken,
    ) -> MindstoreResult<()> {
        guard(token, async {
            match &scope {
                Scope::Project(_) => self.backend.invalidate_memory(id, superseded_by).await?,
                Scope::Global => self.backend.invalidate_global_memory(id, superseded_by).await?,
            }
            self.resync_after_state_change(&scope, id).await;
            Ok(())
        })
        .await
    }

    /// Symmetric to [`Engine::invalidate_memory`].
    pub async fn restore_memory(&self, scope: Scope, id: i64, token: &CancellationToken) -> MindstoreResult<()> {
        guard(token, async {
            match &scope {
                Scope::Project(_) => self.backend.restore_memory(id).await?,
                Scope::Global => self.backend.restore_global_memory(id).await?,
            }
            self.resync_after_state_change(&scope, id).await;
            Ok(())
        })
        .await
    }

    async fn resync_after_state_change(&self, scope: &Scope, id: i64) {
        match self.resolve_memory(scope, id).await {
            Ok(Some(memory)) => self.sync_memories_to_vector(scope, std::slice::from_ref(&memory)).await,
            Ok(None) => {}
            Err(e) => warn!(error = %e, memory_id = id, "drift: could not refetch memory to resync its vector payload"),
        }
    }

    // ---------------------------------------------------------------
    // Read path (C6)
    // ---------------------------------------------------------------

    pub async fn search(&self, request: SearchRequest, token: &CancellationToken) -> MindstoreResult<SearchResponse> {
        guard(token, async {
            self.ensure_lexical_fresh(&request.scope).await?;
            self.counters.record_search_query();
            self.search_engine.search(request).await
        })
        .await
    }

    /// Hybrid search over indexed source chunks.
    pub async fn hybrid_search_code(
        &self,
        request: DocumentSearchRequest,
        token: &CancellationToken,
    ) -> MindstoreResult<DocumentSearchResponse> {
        guard(token, async {
            self.ensure_document_lexical_fresh(&request.project_id, true).await?;
            self.counters.record_search_query();
            self.search_engine.search_documents(DocumentSearchRequest { code: true, ..request }).await
        })
        .await
    }

    /// Hybrid search over indexed documentation chunks.
    pub async fn hybrid_search_docs(
        &self,
        request: DocumentSearchRequest,
        token: &CancellationToken,
    ) -> MindstoreResult<DocumentSearchResponse> {
        guard(token, async {
            self.ensure_document_lexical_fresh(&request.project_id, false).await?;
            self.counters.record_search_query();
            self.search_engine.search_documents(DocumentSearchRequest { code: false, ..request }).await
        })
        .await
    }

    // ---------------------------------------------------------------
    // Memory graph pass-throughs (C7)
    // ---------------------------------------------------------------

    pub async fn create_link(&self, link: NewMemoryLink, token: &CancellationToken) -> MindstoreResult<(i64, bool)> {
        guard(token, self.graph.create_link(link)).await
    }

    pub async fn invalidate_link(
        &self,
        source_id: i64,
        target_id: i64,
        relation: mindstore_core::model::RelationKind,
        token: &CancellationToken,
    ) -> MindstoreResult<()> {
        guard(token, self.graph.invalidate_link(source_id, target_id, relation)).await
    }

    pub async fn auto_link(
        &self,
        memory_id: i64,
        scope: Scope,
        threshold: f64,
        max_links: usize,
        token: &CancellationToken,
    ) -> MindstoreResult<Vec<i64>> {
        guard(token, self.graph.auto_link(memory_id, &scope, threshold, max_links)).await
    }

    /// spec.md §6's `getMemoryWithLinks`: the memory itself plus its
    /// direct neighbors (depth 1), reusing the same traversal
    /// `findConnectedMemories` runs at greater depth.
    pub async fn get_memory_with_links(
        &self,
        scope: Scope,
        id: i64,
        token: &CancellationToken,
    ) -> MindstoreResult<Option<(Memory, Vec<mindstore_graph::traversal::ConnectedMemory>)>> {
        guard(token, async {
            match self.resolve_memory(&scope, id).await? {
                Some(memory) => {
                    let links = self.graph.find_connected(id, Some(1)).await?;
                    Ok(Some((memory, links)))
                }
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn find_connected(
        &self,
        memory_id: i64,
        max_depth: Option<u32>,
        token: &CancellationToken,
    ) -> MindstoreResult<Vec<mindstore_graph::traversal::ConnectedMemory>> {
        guard(token, async {
            self.counters.record_recall_query();
            self.graph.find_connected(memory_id, max_depth).await
        })
        .await
    }

    pub async fn get_graph_stats(&self, scope: Scope, token: &CancellationToken) -> MindstoreResult<GraphStats> {
        guard(token, self.graph.get_graph_stats(&scope)).await
    }

    pub async fn recompute_centrality(&self, token: &CancellationToken) -> MindstoreResult<usize> {
        guard(token, self.graph.recompute_centrality()).await
    }

    // ---------------------------------------------------------------
    // Bulk transfer (C9) and freshness (C10) pass-throughs — both are
    // already fully implemented as free functions over the trait
    // objects; this crate only holds the handles they're called with.
    // ---------------------------------------------------------------

    pub async fn export_all(
        &self,
        scope: Scope,
        backend_name: &str,
        embedding_model: Option<String>,
        token: &CancellationToken,
    ) -> MindstoreResult<Envelope> {
        guard(token, transfer::export_all(self.backend.as_ref(), &scope, backend_name, embedding_model)).await
    }

    pub async fn import_envelope(
        &self,
        scope: Scope,
        envelope: &Envelope,
        token: &CancellationToken,
    ) -> MindstoreResult<ImportResult> {
        guard(token, async {
            let result = transfer::import_envelope(self.backend.as_ref(), &scope, envelope).await?;
            self.lexical.invalidate(lexical_scope(&scope));
            Ok(result)
        })
        .await
    }

    pub async fn backfill(
        &self,
        scope: Scope,
        target: BackfillTarget,
        dry_run: bool,
        token: &CancellationToken,
    ) -> MindstoreResult<BackfillReport> {
        guard(token, transfer::backfill(self.backend.as_ref(), self.vectors.as_ref(), &scope, target, dry_run)).await
    }

    pub fn check_freshness(&self, project_root: &std::path::Path, file_hashes: &[FileHash]) -> MindstoreResult<FreshnessReport> {
        mindstore_storage::freshness::check(project_root, file_hashes)
    }

    // ---------------------------------------------------------------
    // Session counters (spec.md §4.5, §5: "single lock")
    // ---------------------------------------------------------------

    pub fn session_counters(&self) -> SessionCounters {
        self.counters.snapshot()
    }

    pub fn record_web_search_query(&self) {
        self.counters.record_web_search_query();
    }

    pub fn add_cost(&self, amount: f64) {
        self.counters.add_cost(amount);
    }

    /// Snapshots and resets the session counters, then persists the
    /// snapshot as a `LearningDelta` row (spec.md §6's `appendLearningDelta`).
    pub async fn flush_session_counters(
        &self,
        source: String,
        avg_quality: f64,
        token: &CancellationToken,
    ) -> MindstoreResult<(SessionCounters, LearningDelta)> {
        guard(token, async {
            let snapshot = self.counters.flush();
            let mut delta = LearningDelta {
                id: 0,
                source,
                memories_added: snapshot.memories_created,
                distinct_types: snapshot.types_created.len() as u32,
                avg_quality,
                created_at: Utc::now(),
            };
            delta.id = self.backend.append_learning_delta(&delta).await?;
            Ok((snapshot, delta))
        })
        .await
    }

    // ---------------------------------------------------------------
    // Hard delete (state machine: any -> deleted)
    // ---------------------------------------------------------------

    /// Hard delete (spec.md's memory lifecycle: "any -> deleted"), routed
    /// to the `memories` or `global_memories` table by scope.
    pub async fn delete_memory(&self, scope: Scope, id: i64, token: &CancellationToken) -> MindstoreResult<()> {
        guard(token, async {
            match &scope {
                Scope::Project(_) => self.backend.delete_memory(id).await?,
                Scope::Global => self.backend.delete_global_memory(id).await?,
            }
            if let Err(e) = self.vectors.delete(collection_for(&scope), &[id]).await {
                warn!(error = %e, memory_id = id, "drift: vector delete failed for a hard-deleted memory");
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindstore_storage::EmbeddedBackend;
    use mindstore_vector::BuiltinVectorIndex;

    fn setup() -> Engine {
        let backend: Arc<dyn RelationalBackend> = Arc::new(EmbeddedBackend::open_in_memory().unwrap());
        let vectors: Arc<dyn VectorIndex> = Arc::new(BuiltinVectorIndex::new(backend.clone()));
        let lexical = Arc::new(LexicalIndex::new());
        Engine::new(backend, vectors, lexical, MindstoreConfig::default())
    }

    #[tokio::test]
    async fn save_memory_assigns_id_and_bumps_counters() {
        let engine = setup();
        let token = CancellationToken::new();
        let result = engine
            .save_memory(
                Scope::Project("acme".into()),
                "the retry budget was exhausted".into(),
                Some(vec![0.1, 0.2, 0.3]),
                vec!["retry".into()],
                "test".into(),
                SaveMemoryOptions::new(MemoryType::Learning),
                &token,
            )
            .await
            .unwrap();

        assert!(result.created);
        assert!(result.duplicate_of.is_none());
        let counters = engine.session_counters();
        assert_eq!(counters.memories_created, 1);
        assert_eq!(counters.types_created[&MemoryType::Learning], 1);
    }

    #[tokio::test]
    async fn save_memory_detects_duplicate_by_embedding() {
        let engine = setup();
        let token = CancellationToken::new();
        let embedding = vec![1.0, 0.0, 0.0];

        let first = engine
            .save_memory(
                Scope::Project("acme".into()),
                "content a".into(),
                Some(embedding.clone()),
                vec![],
                "test".into(),
                SaveMemoryOptions::new(MemoryType::Observation),
                &token,
            )
            .await
            .unwrap();
        assert!(first.created);

        let second = engine
            .save_memory(
                Scope::Project("acme".into()),
                "content b, nearly identical vector".into(),
                Some(embedding),
                vec![],
                "test".into(),
                SaveMemoryOptions::new(MemoryType::Observation),
                &token,
            )
            .await
            .unwrap();

        assert!(!second.created);
        assert_eq!(second.id, first.id);
        assert_eq!(engine.session_counters().memories_duplicated, 1);
    }

    #[tokio::test]
    async fn save_memory_rejects_empty_content() {
        let engine = setup();
        let token = CancellationToken::new();
        let result = engine
            .save_memory(
                Scope::Global,
                "   ".into(),
                None,
                vec![],
                "test".into(),
                SaveMemoryOptions::new(MemoryType::Observation),
                &token,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn already_cancelled_token_aborts_before_any_write() {
        let engine = setup();
        let token = CancellationToken::new();
        token.cancel();
        let result = engine
            .save_memory(
                Scope::Project("acme".into()),
                "never written".into(),
                None,
                vec![],
                "test".into(),
                SaveMemoryOptions::new(MemoryType::Observation),
                &token,
            )
            .await;
        assert!(matches!(result, Err(MindstoreError::Cancelled)));
        assert_eq!(engine.session_counters().memories_created, 0);
    }

    #[tokio::test]
    async fn invalidate_then_restore_round_trips() {
        let engine = setup();
        let token = CancellationToken::new();
        let scope = Scope::Project("acme".into());
        let saved = engine
            .save_memory(
                scope.clone(),
                "a decision worth revisiting".into(),
                None,
                vec![],
                "test".into(),
                SaveMemoryOptions::new(MemoryType::Decision),
                &token,
            )
            .await
            .unwrap();

        engine.invalidate_memory(scope.clone(), saved.id, saved.id, &token).await.unwrap();
        let after_invalidate = engine.resolve_memory(&scope, saved.id).await.unwrap().unwrap();
        assert!(after_invalidate.invalidated_by.is_some());

        engine.restore_memory(scope.clone(), saved.id, &token).await.unwrap();
        let after_restore = engine.resolve_memory(&scope, saved.id).await.unwrap().unwrap();
        assert!(after_restore.invalidated_by.is_none());
    }

    /// A project-scoped memory and a global memory can legitimately share
    /// the same autoincrement id (separate tables, independent sequences).
    /// Invalidating/restoring/deleting the global one must never touch the
    /// project row sitting at that same id.
    #[tokio::test]
    async fn global_scope_lifecycle_methods_never_touch_project_table() {
        let engine = setup();
        let token = CancellationToken::new();
        let project_scope = Scope::Project("acme".into());
        let project_saved = engine
            .save_memory(
                project_scope.clone(),
                "project-scoped decision".into(),
                None,
                vec![],
                "test".into(),
                SaveMemoryOptions::new(MemoryType::Decision),
                &token,
            )
            .await
            .unwrap();
        let global_saved = engine
            .save_memory(
                Scope::Global,
                "cross-project convention".into(),
                None,
                vec![],
                "test".into(),
                SaveMemoryOptions::new(MemoryType::Decision),
                &token,
            )
            .await
            .unwrap();
        assert_eq!(project_saved.id, global_saved.id, "test assumes shared autoincrement ids across tables");

        engine
            .invalidate_memory(Scope::Global, global_saved.id, global_saved.id, &token)
            .await
            .unwrap();
        let global_after_invalidate = engine.resolve_memory(&Scope::Global, global_saved.id).await.unwrap().unwrap();
        assert!(global_after_invalidate.invalidated_by.is_some());
        let project_untouched = engine.resolve_memory(&project_scope, project_saved.id).await.unwrap().unwrap();
        assert!(project_untouched.invalidated_by.is_none());

        engine.restore_memory(Scope::Global, global_saved.id, &token).await.unwrap();
        let global_after_restore = engine.resolve_memory(&Scope::Global, global_saved.id).await.unwrap().unwrap();
        assert!(global_after_restore.invalidated_by.is_none());

        engine.delete_memory(Scope::Global, global_saved.id, &token).await.unwrap();
        assert!(engine.resolve_memory(&Scope::Global, global_saved.id).await.unwrap().is_none());
        assert!(engine.resolve_memory(&project_scope, project_saved.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn upsert_documents_batch_hashed_supersedes_prior_chunks() {
        let engine = setup();
        let token = CancellationToken::new();
        let scope = Scope::Project("acme".into());

        let first = engine
            .upsert_documents_batch_hashed(
                scope.clone(),
                "src/lib.rs".into(),
                "hash-v1".into(),
                vec![NewDocument {
                    file_path: "src/lib.rs".into(),
                    chunk_index: 0,
                    content: "fn old() {}".into(),
                    start_line: 1,
                    end_line: 1,
                    embedding: None,
                }],
                &token,
            )
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = engine
            .upsert_documents_batch_hashed(
                scope.clone(),
                "src/lib.rs".into(),
                "hash-v2".into(),
                vec![NewDocument {
                    file_path: "src/lib.rs".into(),
                    chunk_index: 0,
                    content: "fn new() {}".into(),
                    start_line: 1,
                    end_line: 1,
                    embedding: None,
                }],
                &token,
            )
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_ne!(second[0], first[0]);
    }

    #[tokio::test]
    async fn hybrid_search_code_finds_source_chunk_but_not_docs() {
        let engine = setup();
        let token = CancellationToken::new();
        let scope = Scope::Project("acme".into());

        engine
            .upsert_documents_batch(
                scope.clone(),
                vec![
                    NewDocument {
                        file_path: "code:src/retry.rs".into(),
                        chunk_index: 0,
                        content: "fn retry_budget_exhausted() {}".into(),
                        start_line: 1,
                        end_line: 1,
                        embedding: Some(vec![0.1, 0.2, 0.3]),
                    },
                    NewDocument {
                        file_path: "README.md".into(),
                        chunk_index: 0,
                        content: "retry budget exhausted explanation".into(),
                        start_line: 1,
                        end_line: 1,
                        embedding: Some(vec![0.1, 0.2, 0.3]),
                    },
                ],
                &token,
            )
            .await
            .unwrap();

        let response = engine
            .hybrid_search_code(
                DocumentSearchRequest {
                    project_id: "acme".into(),
                    query: "retry_budget_exhausted".into(),
                    query_embedding: vec![0.1, 0.2, 0.3],
                    k: 5,
                    score_threshold: None,
                    code: true,
                },
                &token,
            )
            .await
            .unwrap();

        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].file_path, "src/retry.rs");
    }
}
