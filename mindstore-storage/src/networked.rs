//! The networked driver: the same [`RelationalBackend`] contract against a
//! shared PostgreSQL server instead of an embedded SQLite file. Unlike
//! [`crate::embedded`], every call here is genuinely async — `sqlx` talks to
//! the server over the wire, so there is no sync-bridging concern.
//!
//! Schema mirrors the embedded driver's tables column-for-column; the two
//! backends differ only in which driver they forward to (spec.md §9), not
//! in what they store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use mindstore_core::errors::{MindstoreResult, StorageError};
use mindstore_core::model::{
    Centrality, Document, FileHash, GlobalMemory, LearningDelta, Memory, MemoryLink, MemoryType,
    RelationKind, SkillEntry, TokenFrequency, TokenStat, WebSearchEntry,
};
use mindstore_core::traits::{NewDocument, NewMemory, NewMemoryLink, RelationalBackend, Scope};

use crate::queries::codec::{
    blob_to_embedding, embedding_to_blob, factors_from_json, factors_to_json, tags_from_json,
    tags_to_json,
};

fn pg_err(e: sqlx::Error) -> StorageError {
    StorageError::Postgres {
        message: e.to_string(),
    }
}

fn scope_key(scope: &Scope) -> &str {
    match scope {
        Scope::Project(id) => id.as_str(),
        Scope::Global => "",
    }
}

/// Unlike `scope_key` (used where `project_id` is `NOT NULL`), the journal
/// tables store `NULL` for global-scope rows so `project_id = $1` style
/// filters can't accidentally conflate "global" with a project literally
/// named "".
fn scope_key_nullable(scope: &Scope) -> Option<&str> {
    match scope {
        Scope::Project(id) => Some(id.as_str()),
        Scope::Global => None,
    }
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        id          BIGSERIAL PRIMARY KEY,
        project_id  TEXT NOT NULL,
        file_path   TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        content     TEXT NOT NULL,
        start_line  INTEGER NOT NULL,
        end_line    INTEGER NOT NULL,
        embedding   BYTEA,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (project_id, file_path, chunk_index)
    );
    CREATE INDEX IF NOT EXISTS idx_documents_path ON documents(project_id, file_path);

    CREATE TABLE IF NOT EXISTS file_hashes (
        project_id    TEXT NOT NULL,
        file_path     TEXT NOT NULL,
        content_hash  TEXT NOT NULL,
        indexed_at    TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (project_id, file_path)
    );

    CREATE TABLE IF NOT EXISTS memories (
        id               BIGSERIAL PRIMARY KEY,
        project_id       TEXT NOT NULL,
        content          TEXT NOT NULL,
        tags             TEXT NOT NULL DEFAULT '[]',
        source           TEXT NOT NULL,
        memory_type      TEXT NOT NULL,
        quality_score    DOUBLE PRECISION NOT NULL DEFAULT 0.0,
        quality_factors  TEXT NOT NULL DEFAULT '{}',
        embedding        BYTEA,
        access_count     BIGINT NOT NULL DEFAULT 0,
        last_accessed    TIMESTAMPTZ NOT NULL DEFAULT now(),
        valid_from       TIMESTAMPTZ,
        valid_until      TIMESTAMPTZ,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
        invalidated_by   BIGINT
    );
    CREATE INDEX IF NOT EXISTS idx_memories_project ON memories(project_id);
    CREATE INDEX IF NOT EXISTS idx_memories_fts ON memories USING GIN (to_tsvector('english', content));

    CREATE TABLE IF NOT EXISTS global_memories (
        id               BIGSERIAL PRIMARY KEY,
        content          TEXT NOT NULL,
        tags             TEXT NOT NULL DEFAULT '[]',
        source           TEXT NOT NULL,
        memory_type      TEXT NOT NULL,
        quality_score    DOUBLE PRECISION NOT NULL DEFAULT 0.0,
        quality_factors  TEXT NOT NULL DEFAULT '{}',
        embedding        BYTEA,
        access_count     BIGINT NOT NULL DEFAULT 0,
        last_accessed    TIMESTAMPTZ NOT NULL DEFAULT now(),
        valid_from       TIMESTAMPTZ,
        valid_until      TIMESTAMPTZ,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
        invalidated_by   BIGINT
    );

    CREATE TABLE IF NOT EXISTS memory_links (
        id             BIGSERIAL PRIMARY KEY,
        source_id      BIGINT NOT NULL,
        target_id      BIGINT NOT NULL,
        relation       TEXT NOT NULL,
        weight         DOUBLE PRECISION NOT NULL DEFAULT 1.0,
        valid_from     TIMESTAMPTZ,
        valid_until    TIMESTAMPTZ,
        llm_enriched   BOOLEAN NOT NULL DEFAULT false,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (source_id, target_id, relation)
    );
    CREATE INDEX IF NOT EXISTS idx_links_source ON memory_links(source_id);
    CREATE INDEX IF NOT EXISTS idx_links_target ON memory_links(target_id);

    CREATE TABLE IF NOT EXISTS centrality (
        memory_id         BIGINT PRIMARY KEY,
        degree            INTEGER NOT NULL,
        normalized_degree DOUBLE PRECISION NOT NULL
    );

    CREATE TABLE IF NOT EXISTS token_stats (
        scope              TEXT NOT NULL,
        token              TEXT NOT NULL,
        document_frequency BIGINT NOT NULL,
        total_documents    BIGINT NOT NULL,
        PRIMARY KEY (scope, token)
    );

    CREATE TABLE IF NOT EXISTS token_frequencies (
        id          BIGSERIAL PRIMARY KEY,
        project_id  TEXT,
        token       TEXT NOT NULL,
        occurrences BIGINT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_token_freq_project ON token_frequencies(project_id, token);

    CREATE TABLE IF NOT EXISTS learning_deltas (
        id              BIGSERIAL PRIMARY KEY,
        source          TEXT NOT NULL,
        memories_added  BIGINT NOT NULL,
        distinct_types  INTEGER NOT NULL,
        avg_quality     DOUBLE PRECISION NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    );

    CREATE TABLE IF NOT EXISTS web_search_history (
        id          BIGSERIAL PRIMARY KEY,
        project_id  TEXT,
        payload     JSONB NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    CREATE INDEX IF NOT EXISTS idx_web_search_history_project ON web_search_history(project_id);

    CREATE TABLE IF NOT EXISTS skills (
        id          BIGSERIAL PRIMARY KEY,
        project_id  TEXT,
        payload     JSONB NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    CREATE INDEX IF NOT EXISTS idx_skills_project ON skills(project_id);
";

pub struct NetworkedBackend {
    pool: PgPool,
}

impl NetworkedBackend {
    pub async fn connect(url: &str, max_connections: u32) -> MindstoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(pg_err)?;
        sqlx::query(SCHEMA).execute(&pool).await.map_err(pg_err)?;
        Ok(Self { pool })
    }

    fn memory_table(scope: &Scope) -> &'static str {
        match scope {
            Scope::Project(_) => "memories",
            Scope::Global => "global_memories",
        }
    }

    async fn memory_from_row(row: &sqlx::postgres::PgRow) -> MindstoreResult<Memory> {
        let tags: String = row.try_get("tags").map_err(pg_err)?;
        let factors: String = row.try_get("quality_factors").map_err(pg_err)?;
        let embedding: Option<Vec<u8>> = row.try_get("embedding").map_err(pg_err)?;
        let memory_type: String = row.try_get("memory_type").map_err(pg_err)?;
        Ok(Memory {
            id: row.try_get("id").map_err(pg_err)?,
            content: row.try_get("content").map_err(pg_err)?,
            tags: tags_from_json(&tags)?,
            source: row.try_get("source").map_err(pg_err)?,
            memory_type: memory_type.parse::<MemoryType>().map_err(|e| StorageError::Sqlite {
                message: e.to_string(),
            })?,
            quality_score: row.try_get("quality_score").map_err(pg_err)?,
            quality_factors: factors_from_json(&factors)?,
            embedding: blob_to_embedding(embedding),
            access_count: row.try_get::<i64, _>("access_count").map_err(pg_err)? as u64,
            last_accessed: row.try_get("last_accessed").map_err(pg_err)?,
            valid_from: row.try_get("valid_from").map_err(pg_err)?,
            valid_until: row.try_get("valid_until").map_err(pg_err)?,
            created_at: row.try_get("created_at").map_err(pg_err)?,
            invalidated_by: row.try_get("invalidated_by").map_err(pg_err)?,
        })
    }

    fn document_from_row(row: &sqlx::postgres::PgRow) -> MindstoreResult<Document> {
        let embedding: Option<Vec<u8>> = row.try_get("embedding").map_err(pg_err)?;
        Ok(Document {
            id: row.try_get("id").map_err(pg_err)?,
            file_path: row.try_get("file_path").map_err(pg_err)?,
            chunk_index: row.try_get::<i32, _>("chunk_index").map_err(pg_err)? as u32,
            content: row.try_get("content").map_err(pg_err)?,
            start_line: row.try_get::<i32, _>("start_line").map_err(pg_err)? as u32,
            end_line: row.try_get::<i32, _>("end_line").map_err(pg_err)? as u32,
            embedding: blob_to_embedding(embedding),
            created_at: row.try_get("created_at").map_err(pg_err)?,
            updated_at: row.try_get("updated_at").map_err(pg_err)?,
        })
    }

    fn link_from_row(row: &sqlx::postgres::PgRow) -> MindstoreResult<MemoryLink> {
        let relation: String = row.try_get("relation").map_err(pg_err)?;
        Ok(MemoryLink {
            id: row.try_get("id").map_err(pg_err)?,
            source_id: row.try_get("source_id").map_err(pg_err)?,
            target_id: row.try_get("target_id").map_err(pg_err)?,
            relation: relation.parse::<RelationKind>().map_err(|e| StorageError::Sqlite {
                message: e.to_string(),
            })?,
            weight: row.try_get("weight").map_err(pg_err)?,
            valid_from: row.try_get("valid_from").map_err(pg_err)?,
            valid_until: row.try_get("valid_until").map_err(pg_err)?,
            llm_enriched: row.try_get("llm_enriched").map_err(pg_err)?,
            created_at: row.try_get("created_at").map_err(pg_err)?,
        })
    }
}

#[async_trait]
impl RelationalBackend for NetworkedBackend {
    async fn insert_documents(&self, scope: &Scope, docs: &[NewDocument]) -> MindstoreResult<Vec<i64>> {
        let mut tx = self.pool.begin().await.map_err(pg_err)?;
        let mut ids = Vec::with_capacity(docs.len());
        for doc in docs {
            let blob = embedding_to_blob(&doc.embedding);
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO documents (project_id, file_path, chunk_index, content, start_line, end_line, embedding)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (project_id, file_path, chunk_index) DO UPDATE SET
                    content = excluded.content, start_line = excluded.start_line,
                    end_line = excluded.end_line, embedding = excluded.embedding, updated_at = now()
                 RETURNING id",
            )
            .bind(scope_key(scope))
            .bind(&doc.file_path)
            .bind(doc.chunk_index as i32)
            .bind(&doc.content)
            .bind(doc.start_line as i32)
            .bind(doc.end_line as i32)
            .bind(blob)
            .fetch_one(&mut *tx)
            .await
            .map_err(pg_err)?;
            ids.push(id);
        }
        tx.commit().await.map_err(pg_err)?;
        Ok(ids)
    }

    async fn get_document(&self, id: i64) -> MindstoreResult<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?;
        row.as_ref().map(Self::document_from_row).transpose()
    }

    async fn get_documents(&self, ids: &[i64]) -> MindstoreResult<Vec<Document>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(d) = self.get_document(*id).await? {
                out.push(d);
            }
        }
        Ok(out)
    }

    async fn documents_by_path(&self, scope: &Scope, file_path: &str) -> MindstoreResult<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents WHERE project_id = $1 AND file_path = $2 ORDER BY chunk_index")
            .bind(scope_key(scope))
            .bind(file_path)
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        rows.iter().map(Self::document_from_row).collect()
    }

    async fn delete_documents_by_path(&self, scope: &Scope, file_path: &str) -> MindstoreResult<Vec<i64>> {
        let rows = sqlx::query_scalar::<_, i64>(
            "DELETE FROM documents WHERE project_id = $1 AND file_path = $2 RETURNING id",
        )
        .bind(scope_key(scope))
        .bind(file_path)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;
        Ok(rows)
    }

    async fn all_documents(&self, scope: &Scope) -> MindstoreResult<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents WHERE project_id = $1 ORDER BY file_path, chunk_index")
            .bind(scope_key(scope))
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        rows.iter().map(Self::document_from_row).collect()
    }

    async fn clear_documents(&self, scope: &Scope) -> MindstoreResult<usize> {
        let result = sqlx::query("DELETE FROM documents WHERE project_id = $1")
            .bind(scope_key(scope))
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(result.rows_affected() as usize)
    }

    async fn upsert_file_hash(&self, scope: &Scope, hash: &FileHash) -> MindstoreResult<()> {
        sqlx::query(
            "INSERT INTO file_hashes (project_id, file_path, content_hash, indexed_at) VALUES ($1, $2, $3, $4)
             ON CONFLICT (project_id, file_path) DO UPDATE SET
                content_hash = excluded.content_hash, indexed_at = excluded.indexed_at",
        )
        .bind(scope_key(scope))
        .bind(&hash.file_path)
        .bind(&hash.content_hash)
        .bind(hash.indexed_at)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;
        Ok(())
    }

    async fn all_file_hashes(&self, scope: &Scope) -> MindstoreResult<Vec<FileHash>> {
        let rows = sqlx::query("SELECT file_path, content_hash, indexed_at FROM file_hashes WHERE project_id = $1")
            .bind(scope_key(scope))
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        rows.into_iter()
            .map(|row| {
                Ok(FileHash {
                    file_path: row.try_get("file_path").map_err(pg_err)?,
                    content_hash: row.try_get("content_hash").map_err(pg_err)?,
                    indexed_at: row.try_get("indexed_at").map_err(pg_err)?,
                })
            })
            .collect()
    }

    async fn delete_file_hash(&self, scope: &Scope, file_path: &str) -> MindstoreResult<()> {
        sqlx::query("DELETE FROM file_hashes WHERE project_id = $1 AND file_path = $2")
            .bind(scope_key(scope))
            .bind(file_path)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn insert_memories(&self, scope: &Scope, new_memories: &[NewMemory]) -> MindstoreResult<Vec<i64>> {
        let table = Self::memory_table(scope);
        let mut tx = self.pool.begin().await.map_err(pg_err)?;
        let mut ids = Vec::with_capacity(new_memories.len());
        for m in new_memories {
            let tags_json = tags_to_json(&m.tags)?;
            let factors_json = factors_to_json(&m.quality_factors)?;
            let blob = embedding_to_blob(&m.embedding);
            let id: i64 = if matches!(scope, Scope::Global) {
                sqlx::query_scalar(&format!(
                    "INSERT INTO {table} (content, tags, source, memory_type, quality_score, quality_factors, embedding, valid_from, valid_until)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id"
                ))
                .bind(&m.content)
                .bind(&tags_json)
                .bind(&m.source)
                .bind(m.memory_type.as_str())
                .bind(m.quality_score)
                .bind(&factors_json)
                .bind(blob)
                .bind(m.valid_from)
                .bind(m.valid_until)
                .fetch_one(&mut *tx)
                .await
            } else {
                sqlx::query_scalar(&format!(
                    "INSERT INTO {table} (project_id, content, tags, source, memory_type, quality_score, quality_factors, embedding, valid_from, valid_until)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id"
                ))
                .bind(scope_key(scope))
                .bind(&m.content)
                .bind(&tags_json)
                .bind(&m.source)
                .bind(m.memory_type.as_str())
                .bind(m.quality_score)
                .bind(&factors_json)
                .bind(blob)
                .bind(m.valid_from)
                .bind(m.valid_until)
                .fetch_one(&mut *tx)
                .await
            }
            .map_err(pg_err)?;
            ids.push(id);
        }
        tx.commit().await.map_err(pg_err)?;
        Ok(ids)
    }

    async fn get_memory(&self, id: i64) -> MindstoreResult<Option<Memory>> {
        let row = sqlx::query("SELECT * FROM memories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?;
        match row {
            Some(r) => Ok(Some(Self::memory_from_row(&r).await?)),
            None => Ok(None),
        }
    }

    async fn get_memories(&self, ids: &[i64]) -> MindstoreResult<Vec<Memory>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(m) = self.get_memory(*id).await? {
                out.push(m);
            }
        }
        Ok(out)
    }

    async fn update_memory(&self, memory: &Memory) -> MindstoreResult<()> {
        let tags_json = tags_to_json(&memory.tags)?;
        let factors_json = factors_to_json(&memory.quality_factors)?;
        let blob = embedding_to_blob(&memory.embedding);
        let result = sqlx::query(
            "UPDATE memories SET content = $2, tags = $3, source = $4, memory_type = $5, quality_score = $6,
             quality_factors = $7, embedding = $8, valid_from = $9, valid_until = $10, invalidated_by = $11
             WHERE id = $1",
        )
        .bind(memory.id)
        .bind(&memory.content)
        .bind(&tags_json)
        .bind(&memory.source)
        .bind(memory.memory_type.as_str())
        .bind(memory.quality_score)
        .bind(&factors_json)
        .bind(blob)
        .bind(memory.valid_from)
        .bind(memory.valid_until)
        .bind(memory.invalidated_by)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::SchemaMissing {
                name: format!("memories#{}", memory.id),
            }
            .into());
        }
        Ok(())
    }

    async fn delete_memory(&self, id: i64) -> MindstoreResult<()> {
        sqlx::query("DELETE FROM memories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn invalidate_memory(&self, id: i64, superseded_by: i64) -> MindstoreResult<()> {
        sqlx::query("UPDATE memories SET invalidated_by = $2, valid_until = now() WHERE id = $1")
            .bind(id)
            .bind(superseded_by)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn restore_memory(&self, id: i64) -> MindstoreResult<()> {
        sqlx::query("UPDATE memories SET invalidated_by = NULL, valid_until = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn bump_access(&self, id: i64, at: DateTime<Utc>) -> MindstoreResult<()> {
        sqlx::query("UPDATE memories SET access_count = access_count + 1, last_accessed = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn all_memories(&self, scope: &Scope) -> MindstoreResult<Vec<Memory>> {
        let rows = sqlx::query("SELECT * FROM memories WHERE project_id = $1 ORDER BY id")
            .bind(scope_key(scope))
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(Self::memory_from_row(row).await?);
        }
        Ok(out)
    }

    async fn update_global_memory(&self, memory: &Memory) -> MindstoreResult<()> {
        let tags_json = tags_to_json(&memory.tags)?;
        let factors_json = factors_to_json(&memory.quality_factors)?;
        let blob = embedding_to_blob(&memory.embedding);
        let result = sqlx::query(
            "UPDATE global_memories SET content = $2, tags = $3, source = $4, memory_type = $5, quality_score = $6,
             quality_factors = $7, embedding = $8, valid_from = $9, valid_until = $10, invalidated_by = $11
             WHERE id = $1",
        )
        .bind(memory.id)
        .bind(&memory.content)
        .bind(&tags_json)
        .bind(&memory.source)
        .bind(memory.memory_type.as_str())
        .bind(memory.quality_score)
        .bind(&factors_json)
        .bind(blob)
        .bind(memory.valid_from)
        .bind(memory.valid_until)
        .bind(memory.invalidated_by)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::SchemaMissing {
                name: format!("global_memories#{}", memory.id),
            }
            .into());
        }
        Ok(())
    }

    async fn delete_global_memory(&self, id: i64) -> MindstoreResult<()> {
        sqlx::query("DELETE FROM global_memories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn invalidate_global_memory(&self, id: i64, superseded_by: i64) -> MindstoreResult<()> {
        sqlx::query("UPDATE global_memories SET invalidated_by = $2, valid_until = now() WHERE id = $1")
            .bind(id)
            .bind(superseded_by)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn restore_global_memory(&self, id: i64) -> MindstoreResult<()> {
        sqlx::query("UPDATE global_memories SET invalidated_by = NULL, valid_until = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn bump_global_access(&self, id: i64, at: DateTime<Utc>) -> MindstoreResult<()> {
        sqlx::query("UPDATE global_memories SET access_count = access_count + 1, last_accessed = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn cosine_search_memories(&self, scope: &Scope, embedding: &[f32], limit: usize) -> MindstoreResult<Vec<(Memory, f64)>> {
        let candidates = self.all_memories(scope).await?;
        let mut scored: Vec<(Memory, f64)> = candidates
            .into_iter()
            .filter_map(|m| {
                let sim = m.embedding.as_ref().map(|e| cosine_similarity(e, embedding))?;
                Some((m, sim))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn insert_global_memories(&self, new_memories: &[NewMemory]) -> MindstoreResult<Vec<i64>> {
        self.insert_memories(&Scope::Global, new_memories).await
    }

    async fn get_global_memory(&self, id: i64) -> MindstoreResult<Option<GlobalMemory>> {
        let row = sqlx::query("SELECT * FROM global_memories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?;
        match row {
            Some(r) => Ok(Some(GlobalMemory(Self::memory_from_row(&r).await?))),
            None => Ok(None),
        }
    }

    async fn all_global_memories(&self) -> MindstoreResult<Vec<GlobalMemory>> {
        let rows = sqlx::query("SELECT * FROM global_memories ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(GlobalMemory(Self::memory_from_row(row).await?));
        }
        Ok(out)
    }

    async fn upsert_link(&self, link: &NewMemoryLink) -> MindstoreResult<(i64, bool)> {
        if link.source_id == link.target_id {
            return Err(mindstore_core::errors::ValidationError::SelfLink { id: link.source_id }.into());
        }
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM memory_links WHERE source_id = $1 AND target_id = $2 AND relation = $3",
        )
        .bind(link.source_id)
        .bind(link.target_id)
        .bind(link.relation.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?;

        if let Some(id) = existing {
            sqlx::query("UPDATE memory_links SET weight = $2, valid_from = $3, valid_until = $4, llm_enriched = $5 WHERE id = $1")
                .bind(id)
                .bind(link.weight)
                .bind(link.valid_from)
                .bind(link.valid_until)
                .bind(link.llm_enriched)
                .execute(&self.pool)
                .await
                .map_err(pg_err)?;
            Ok((id, false))
        } else {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO memory_links (source_id, target_id, relation, weight, valid_from, valid_until, llm_enriched)
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
            )
            .bind(link.source_id)
            .bind(link.target_id)
            .bind(link.relation.as_str())
            .bind(link.weight)
            .bind(link.valid_from)
            .bind(link.valid_until)
            .bind(link.llm_enriched)
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)?;
            Ok((id, true))
        }
    }

    async fn get_link(&self, source_id: i64, target_id: i64, relation: RelationKind) -> MindstoreResult<Option<MemoryLink>> {
        let row = sqlx::query("SELECT * FROM memory_links WHERE source_id = $1 AND target_id = $2 AND relation = $3")
            .bind(source_id)
            .bind(target_id)
            .bind(relation.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?;
        row.as_ref().map(Self::link_from_row).transpose()
    }

    async fn links_for_memory(&self, memory_id: i64) -> MindstoreResult<Vec<MemoryLink>> {
        let rows = sqlx::query("SELECT * FROM memory_links WHERE source_id = $1 OR target_id = $1")
            .bind(memory_id)
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        rows.iter().map(Self::link_from_row).collect()
    }

    async fn invalidate_link(&self, source_id: i64, target_id: i64, relation: RelationKind, at: DateTime<Utc>) -> MindstoreResult<()> {
        sqlx::query("UPDATE memory_links SET valid_until = $4 WHERE source_id = $1 AND target_id = $2 AND relation = $3")
            .bind(source_id)
            .bind(target_id)
            .bind(relation.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn all_links(&self) -> MindstoreResult<Vec<MemoryLink>> {
        let rows = sqlx::query("SELECT * FROM memory_links ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        rows.iter().map(Self::link_from_row).collect()
    }

    async fn upsert_centrality(&self, rows: &[Centrality]) -> MindstoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(pg_err)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO centrality (memory_id, degree, normalized_degree) VALUES ($1, $2, $3)
                 ON CONFLICT (memory_id) DO UPDATE SET degree = excluded.degree, normalized_degree = excluded.normalized_degree",
            )
            .bind(row.memory_id)
            .bind(row.degree as i32)
            .bind(row.normalized_degree)
            .execute(&mut *tx)
            .await
            .map_err(pg_err)?;
        }
        tx.commit().await.map_err(pg_err)?;
        Ok(())
    }

    async fn get_centrality(&self, memory_id: i64) -> MindstoreResult<Option<Centrality>> {
        let row = sqlx::query("SELECT memory_id, degree, normalized_degree FROM centrality WHERE memory_id = $1")
            .bind(memory_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?;
        row.map(|r| {
            Ok(Centrality {
                memory_id: r.try_get("memory_id").map_err(pg_err)?,
                degree: r.try_get::<i32, _>("degree").map_err(pg_err)? as u32,
                normalized_degree: r.try_get("normalized_degree").map_err(pg_err)?,
            })
        })
        .transpose()
    }

    async fn all_centrality(&self) -> MindstoreResult<Vec<Centrality>> {
        let rows = sqlx::query("SELECT memory_id, degree, normalized_degree FROM centrality")
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        rows.into_iter()
            .map(|r| {
                Ok(Centrality {
                    memory_id: r.try_get("memory_id").map_err(pg_err)?,
                    degree: r.try_get::<i32, _>("degree").map_err(pg_err)? as u32,
                    normalized_degree: r.try_get("normalized_degree").map_err(pg_err)?,
                })
            })
            .collect()
    }

    async fn record_token_frequencies(&self, rows: &[TokenFrequency]) -> MindstoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(pg_err)?;
        for row in rows {
            sqlx::query("INSERT INTO token_frequencies (project_id, token, occurrences) VALUES ($1, $2, $3)")
                .bind(&row.project_id)
                .bind(&row.token)
                .bind(row.occurrences as i64)
                .execute(&mut *tx)
                .await
                .map_err(pg_err)?;
        }
        tx.commit().await.map_err(pg_err)?;
        Ok(())
    }

    async fn upsert_token_stats(&self, rows: &[TokenStat]) -> MindstoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(pg_err)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO token_stats (scope, token, document_frequency, total_documents) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (scope, token) DO UPDATE SET
                    document_frequency = excluded.document_frequency, total_documents = excluded.total_documents",
            )
            .bind(&row.scope)
            .bind(&row.token)
            .bind(row.document_frequency as i64)
            .bind(row.total_documents as i64)
            .execute(&mut *tx)
            .await
            .map_err(pg_err)?;
        }
        tx.commit().await.map_err(pg_err)?;
        Ok(())
    }

    async fn all_token_stats(&self, scope: &str) -> MindstoreResult<Vec<TokenStat>> {
        let rows = sqlx::query("SELECT scope, token, document_frequency, total_documents FROM token_stats WHERE scope = $1")
            .bind(scope)
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        rows.into_iter()
            .map(|r| {
                Ok(TokenStat {
                    scope: r.try_get("scope").map_err(pg_err)?,
                    token: r.try_get("token").map_err(pg_err)?,
                    document_frequency: r.try_get::<i64, _>("document_frequency").map_err(pg_err)? as u64,
                    total_documents: r.try_get::<i64, _>("total_documents").map_err(pg_err)? as u64,
                })
            })
            .collect()
    }

    async fn all_token_frequencies(&self) -> MindstoreResult<Vec<TokenFrequency>> {
        let rows = sqlx::query("SELECT project_id, token, occurrences FROM token_frequencies")
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        rows.into_iter()
            .map(|r| {
                Ok(TokenFrequency {
                    project_id: r.try_get("project_id").map_err(pg_err)?,
                    token: r.try_get("token").map_err(pg_err)?,
                    occurrences: r.try_get::<i64, _>("occurrences").map_err(pg_err)? as u64,
                })
            })
            .collect()
    }

    async fn all_token_stats_every_scope(&self) -> MindstoreResult<Vec<TokenStat>> {
        let rows = sqlx::query("SELECT scope, token, document_frequency, total_documents FROM token_stats")
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;
        rows.into_iter()
            .map(|r| {
                Ok(TokenStat {
                    scope: r.try_get("scope").map_err(pg_err)?,
                    token: r.try_get("token").map_err(pg_err)?,
                    document_frequency: r.try_get::<i64, _>("document_frequency").map_err(pg_err)? as u64,
                    total_documents: r.try_get::<i64, _>("total_documents").map_err(pg_err)? as u64,
                })
            })
            .collect()
    }

    async fn append_learning_delta(&self, delta: &LearningDelta) -> MindstoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO learning_deltas (source, memories_added, distinct_types, avg_quality) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&delta.source)
        .bind(delta.memories_added as i64)
        .bind(delta.distinct_types as i32)
        .bind(delta.avg_quality)
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;
        Ok(id)
    }

    async fn recent_learning_deltas(&self, limit: usize) -> MindstoreResult<Vec<LearningDelta>> {
        let rows = sqlx::query(
            "SELECT id, source, memories_added, distinct_types, avg_quality, created_at FROM learning_deltas
             ORDER BY id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;
        rows.into_iter()
            .map(|r| {
                Ok(LearningDelta {
                    id: r.try_get("id").map_err(pg_err)?,
                    source: r.try_get("source").map_err(pg_err)?,
                    memories_added: r.try_get::<i64, _>("memories_added").map_err(pg_err)? as u64,
                    distinct_types: r.try_get::<i32, _>("distinct_types").map_err(pg_err)? as u32,
                    avg_quality: r.try_get("avg_quality").map_err(pg_err)?,
                    created_at: r.try_get("created_at").map_err(pg_err)?,
                })
            })
            .collect()
    }

    async fn record_web_search(&self, scope: &Scope, payload: serde_json::Value) -> MindstoreResult<i64> {
        let id: i64 = sqlx::query_scalar("INSERT INTO web_search_history (project_id, payload) VALUES ($1, $2) RETURNING id")
            .bind(scope_key_nullable(scope))
            .bind(&payload)
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(id)
    }

    async fn recent_web_searches(&self, scope: &Scope, limit: usize) -> MindstoreResult<Vec<WebSearchEntry>> {
        let rows = sqlx::query(
            "SELECT id, project_id, payload, created_at FROM web_search_history WHERE project_id IS NOT DISTINCT FROM $1
             ORDER BY id DESC LIMIT $2",
        )
        .bind(scope_key_nullable(scope))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;
        rows.into_iter()
            .map(|r| {
                Ok(WebSearchEntry {
                    id: r.try_get("id").map_err(pg_err)?,
                    project_id: r.try_get("project_id").map_err(pg_err)?,
                    payload: r.try_get("payload").map_err(pg_err)?,
                    created_at: r.try_get("created_at").map_err(pg_err)?,
                })
            })
            .collect()
    }

    async fn record_skill(&self, scope: &Scope, payload: serde_json::Value) -> MindstoreResult<i64> {
        let id: i64 = sqlx::query_scalar("INSERT INTO skills (project_id, payload) VALUES ($1, $2) RETURNING id")
            .bind(scope_key_nullable(scope))
            .bind(&payload)
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(id)
    }

    async fn all_skills(&self, scope: &Scope) -> MindstoreResult<Vec<SkillEntry>> {
        let rows = sqlx::query(
            "SELECT id, project_id, payload, created_at FROM skills WHERE project_id IS NOT DISTINCT FROM $1 ORDER BY id",
        )
        .bind(scope_key_nullable(scope))
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;
        rows.into_iter()
            .map(|r| {
                Ok(SkillEntry {
                    id: r.try_get("id").map_err(pg_err)?,
                    project_id: r.try_get("project_id").map_err(pg_err)?,
                    payload: r.try_get("payload").map_err(pg_err)?,
                    created_at: r.try_get("created_at").map_err(pg_err)?,
                })
            })
            .collect()
    }

    async fn restore_documents(&self, scope: &Scope, docs: &[Document], destructive: bool) -> MindstoreResult<HashMap<i64, i64>> {
        let mut tx = self.pool.begin().await.map_err(pg_err)?;
        if destructive {
            sqlx::query("DELETE FROM documents WHERE project_id = $1")
                .bind(scope_key(scope))
                .execute(&mut *tx)
                .await
                .map_err(pg_err)?;
        }
        let mut map = HashMap::with_capacity(docs.len());
        for doc in docs {
            let blob = embedding_to_blob(&doc.embedding);
            let new_id: i64 = sqlx::query_scalar(
                "INSERT INTO documents (project_id, file_path, chunk_index, content, start_line, end_line, embedding, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
            )
            .bind(scope_key(scope))
            .bind(&doc.file_path)
            .bind(doc.chunk_index as i32)
            .bind(&doc.content)
            .bind(doc.start_line as i32)
            .bind(doc.end_line as i32)
            .bind(blob)
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(pg_err)?;
            map.insert(doc.id, new_id);
        }
        tx.commit().await.map_err(pg_err)?;
        Ok(map)
    }

    async fn restore_memories(&self, scope: &Scope, restore_rows: &[Memory], destructive: bool) -> MindstoreResult<HashMap<i64, i64>> {
        let table = Self::memory_table(scope);
        let mut tx = self.pool.begin().await.map_err(pg_err)?;
        let is_global = matches!(scope, Scope::Global);
        if destructive {
            if is_global {
                sqlx::query(&format!("DELETE FROM {table}")).execute(&mut *tx).await.map_err(pg_err)?;
            } else {
                sqlx::query(&format!("DELETE FROM {table} WHERE project_id = $1"))
                    .bind(scope_key(scope))
                    .execute(&mut *tx)
                    .await
                    .map_err(pg_err)?;
            }
        }
        let mut map = HashMap::with_capacity(restore_rows.len());
        for m in restore_rows {
            let tags_json = tags_to_json(&m.tags)?;
            let factors_json = factors_to_json(&m.quality_factors)?;
            let blob = embedding_to_blob(&m.embedding);
            let new_id: i64 = if is_global {
                sqlx::query_scalar(&format!(
                    "INSERT INTO {table} (content, tags, source, memory_type, quality_score, quality_factors, embedding,
                     access_count, last_accessed, valid_from, valid_until, created_at, invalidated_by)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING id"
                ))
                .bind(&m.content)
                .bind(&tags_json)
                .bind(&m.source)
                .bind(m.memory_type.as_str())
                .bind(m.quality_score)
                .bind(&factors_json)
                .bind(blob)
                .bind(m.access_count as i64)
                .bind(m.last_accessed)
                .bind(m.valid_from)
                .bind(m.valid_until)
                .bind(m.created_at)
                .bind(m.invalidated_by)
                .fetch_one(&mut *tx)
                .await
            } else {
                sqlx::query_scalar(&format!(
                    "INSERT INTO {table} (project_id, content, tags, source, memory_type, quality_score, quality_factors,
                     embedding, access_count, last_accessed, valid_from, valid_until, created_at, invalidated_by)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING id"
                ))
                .bind(scope_key(scope))
                .bind(&m.content)
                .bind(&tags_json)
                .bind(&m.source)
                .bind(m.memory_type.as_str())
                .bind(m.quality_score)
                .bind(&factors_json)
                .bind(blob)
                .bind(m.access_count as i64)
                .bind(m.last_accessed)
                .bind(m.valid_from)
                .bind(m.valid_until)
                .bind(m.created_at)
                .bind(m.invalidated_by)
                .fetch_one(&mut *tx)
                .await
            }
            .map_err(pg_err)?;
            map.insert(m.id, new_id);
        }
        tx.commit().await.map_err(pg_err)?;
        Ok(map)
    }

    async fn restore_links(&self, restore_rows: &[MemoryLink], id_map: &HashMap<i64, i64>) -> MindstoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(pg_err)?;
        for link in restore_rows {
            let (Some(&source_id), Some(&target_id)) = (id_map.get(&link.source_id), id_map.get(&link.target_id)) else {
                continue;
            };
            sqlx::query(
                "INSERT INTO memory_links (source_id, target_id, relation, weight, valid_from, valid_until, llm_enriched, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(source_id)
            .bind(target_id)
            .bind(link.relation.as_str())
            .bind(link.weight)
            .bind(link.valid_from)
            .bind(link.valid_until)
            .bind(link.llm_enriched)
            .bind(link.created_at)
            .execute(&mut *tx)
            .await
            .map_err(pg_err)?;
        }
        tx.commit().await.map_err(pg_err)?;
        Ok(())
    }

    async fn vacuum(&self) -> MindstoreResult<()> {
        sqlx::query("VACUUM").execute(&self.pool).await.map_err(pg_err)?;
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
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
