//! C9 bulk transfer: export, destructive/additive import, and vector-index
//! backfill. Export and import operate against the `RelationalBackend`
//! trait object so they work identically over the embedded and networked
//! drivers; backfill additionally takes a `VectorIndex` trait object.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};

use mindstore_core::errors::{MindstoreResult, StorageError};
use mindstore_core::model::{
    Centrality, Document, FileHash, GlobalMemory, Memory, MemoryLink, TokenFrequency, TokenStat,
};
use mindstore_core::payload::{document_payload, memory_payload};
use mindstore_core::traits::vector::{Collection, VectorIndex, VectorUpsert};
use mindstore_core::traits::{RelationalBackend, Scope};

const ENVELOPE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub backend: String,
    pub embedding_model: Option<String>,
}

/// The versioned checkpoint envelope (spec.md §4.9). Embeddings travel as
/// plain `f32` arrays inside `Document`/`Memory` — single-precision
/// round-trip, no lossy quantization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub metadata: ExportMetadata,
    pub documents: Vec<Document>,
    pub file_hashes: Vec<FileHash>,
    pub memories: Vec<Memory>,
    pub memory_links: Vec<MemoryLink>,
    pub centrality: Vec<Centrality>,
    pub global_memories: Vec<GlobalMemory>,
    pub token_frequencies: Vec<TokenFrequency>,
    pub token_stats: Vec<TokenStat>,
}

pub async fn export_all(
    backend: &dyn RelationalBackend,
    scope: &Scope,
    backend_name: &str,
    embedding_model: Option<String>,
) -> MindstoreResult<Envelope> {
    Ok(Envelope {
        version: ENVELOPE_VERSION.to_string(),
        exported_at: Utc::now(),
        metadata: ExportMetadata {
            backend: backend_name.to_string(),
            embedding_model,
        },
        documents: backend.all_documents(scope).await?,
        file_hashes: backend.all_file_hashes(scope).await?,
        memories: backend.all_memories(scope).await?,
        memory_links: backend.all_links().await?,
        centrality: backend.all_centrality().await?,
        global_memories: backend.all_global_memories().await?,
        token_frequencies: backend.all_token_frequencies().await?,
        token_stats: backend.all_token_stats_every_scope().await?,
    })
}

/// `old_id -> new_id` maps per collection, so a caller can translate any
/// external references (e.g. a vector-store payload) that still carry the
/// exported ids.
#[derive(Debug, Default)]
pub struct ImportResult {
    pub document_ids: HashMap<i64, i64>,
    pub memory_ids: HashMap<i64, i64>,
    pub global_memory_ids: HashMap<i64, i64>,
}

/// Clears the scope's tables then reinserts everything in the envelope,
/// remapping links and centrality onto the freshly assigned memory ids.
/// Runs destructively — spec.md §4.9 draws no distinction between
/// "import" and "destructive restore"; the non-destructive case is
/// `restore_*` called directly by the caller.
pub async fn import_envelope(
    backend: &dyn RelationalBackend,
    scope: &Scope,
    envelope: &Envelope,
) -> MindstoreResult<ImportResult> {
    let document_ids = backend.restore_documents(scope, &envelope.documents, true).await?;
    let memory_ids = backend.restore_memories(scope, &envelope.memories, true).await?;
    let global_memory_ids = backend
        .restore_memories(
            &Scope::Global,
            &envelope.global_memories.iter().map(|g| g.0.clone()).collect::<Vec<_>>(),
            true,
        )
        .await?;

    backend.restore_links(&envelope.memory_links, &memory_ids).await?;

    let remapped_centrality: Vec<Centrality> = envelope
        .centrality
        .iter()
        .filter_map(|c| {
            memory_ids.get(&c.memory_id).map(|&new_id| Centrality {
                memory_id: new_id,
                degree: c.degree,
                normalized_degree: c.normalized_degree,
            })
        })
        .collect();
    if !remapped_centrality.is_empty() {
        backend.upsert_centrality(&remapped_centrality).await?;
    }

    if !envelope.token_frequencies.is_empty() {
        backend.record_token_frequencies(&envelope.token_frequencies).await?;
    }
    if !envelope.token_stats.is_empty() {
        backend.upsert_token_stats(&envelope.token_stats).await?;
    }
    for hash in &envelope.file_hashes {
        backend.upsert_file_hash(scope, hash).await?;
    }

    Ok(ImportResult {
        document_ids,
        memory_ids,
        global_memory_ids,
    })
}

/// Gzip is indicated purely by file extension (`.gz`); everything else is
/// plain JSON.
pub fn write_envelope(envelope: &Envelope, path: impl AsRef<Path>) -> MindstoreResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_vec_pretty(envelope).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;
    let file = std::fs::File::create(path).map_err(|e| StorageError::Io {
        message: format!("create {}: {e}", path.display()),
    })?;
    if is_gzip_path(path) {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&json).map_err(io_err)?;
        encoder.finish().map_err(io_err)?;
    } else {
        let mut file = file;
        file.write_all(&json).map_err(io_err)?;
    }
    Ok(())
}

pub fn read_envelope(path: impl AsRef<Path>) -> MindstoreResult<Envelope> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| StorageError::Io {
        message: format!("open {}: {e}", path.display()),
    })?;
    let mut json = Vec::new();
    if is_gzip_path(path) {
        GzDecoder::new(file).read_to_end(&mut json).map_err(io_err)?;
    } else {
        let mut file = file;
        file.read_to_end(&mut json).map_err(io_err)?;
    }
    serde_json::from_slice(&json).map_err(|e| {
        StorageError::Serialization {
            reason: e.to_string(),
        }
        .into()
    })
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

fn io_err(e: std::io::Error) -> StorageError {
    StorageError::Io {
        message: e.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillTarget {
    Documents,
    Memories,
    GlobalMemories,
    All,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillReport {
    pub upserted: usize,
    pub skipped_no_embedding: usize,
}

impl std::ops::AddAssign for BackfillReport {
    fn add_assign(&mut self, other: Self) {
        self.upserted += other.upserted;
        self.skipped_no_embedding += other.skipped_no_embedding;
    }
}

/// Streams rows with embeddings into the external vector index. Rows
/// without an embedding are counted and skipped rather than erroring —
/// spec.md §4.9 treats a missing embedding as expected for
/// not-yet-embedded content, not a data defect.
pub async fn backfill(
    backend: &dyn RelationalBackend,
    vector: &dyn VectorIndex,
    scope: &Scope,
    target: BackfillTarget,
    dry_run: bool,
) -> MindstoreResult<BackfillReport> {
    let mut report = BackfillReport::default();
    if matches!(target, BackfillTarget::Documents | BackfillTarget::All) {
        report += backfill_documents(backend, vector, scope, dry_run).await?;
    }
    if matches!(target, BackfillTarget::Memories | BackfillTarget::All) {
        report += backfill_memories(backend, vector, scope, dry_run).await?;
    }
    if matches!(target, BackfillTarget::GlobalMemories | BackfillTarget::All) {
        report += backfill_global_memories(backend, vector, dry_run).await?;
    }
    Ok(report)
}

async fn backfill_documents(
    backend: &dyn RelationalBackend,
    vector: &dyn VectorIndex,
    scope: &Scope,
    dry_run: bool,
) -> MindstoreResult<BackfillReport> {
    let docs = backend.all_documents(scope).await?;
    let mut report = BackfillReport::default();
    let mut points = Vec::new();
    for doc in &docs {
        let Some(dense) = doc.embedding.clone() else {
            report.skipped_no_embedding += 1;
            continue;
        };
        points.push(VectorUpsert {
            id: doc.id,
            dense,
            lexical_text: Some(doc.content.clone()),
            payload: document_payload(doc, scope),
        });
    }
    report.upserted = points.len();
    if !dry_run && !points.is_empty() {
        vector.upsert_batch(Collection::Documents, &points).await?;
    }
    Ok(report)
}

async fn backfill_memories(
    backend: &dyn RelationalBackend,
    vector: &dyn VectorIndex,
    scope: &Scope,
    dry_run: bool,
) -> MindstoreResult<BackfillReport> {
    let memories = backend.all_memories(scope).await?;
    let mut report = BackfillReport::default();
    let mut points = Vec::new();
    for m in &memories {
        let Some(dense) = m.embedding.clone() else {
            report.skipped_no_embedding += 1;
            continue;
        };
        points.push(VectorUpsert {
            id: m.id,
            dense,
            lexical_text: Some(m.content.clone()),
            payload: memory_payload(m, scope),
        });
    }
    report.upserted = points.len();
    if !dry_run && !points.is_empty() {
        vector.upsert_batch(Collection::Memories, &points).await?;
    }
    Ok(report)
}

async fn backfill_global_memories(
    backend: &dyn RelationalBackend,
    vector: &dyn VectorIndex,
    dry_run: bool,
) -> MindstoreResult<BackfillReport> {
    let memories = backend.all_global_memories().await?;
    let mut report = BackfillReport::default();
    let mut points = Vec::new();
    for m in &memories {
        let Some(dense) = m.embedding.clone() else {
            report.skipped_no_embedding += 1;
            continue;
        };
        points.push(VectorUpsert {
            id: m.id,
            dense,
            lexical_text: Some(m.content.clone()),
            payload: memory_payload(m, &Scope::Global),
        });
    }
    report.upserted = points.len();
    if !dry_run && !points.is_empty() {
        vector.upsert_batch(Collection::GlobalMemories, &points).await?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_extension_detection() {
        assert!(is_gzip_path(Path::new("backup.json.gz")));
        assert!(!is_gzip_path(Path::new("backup.json")));
    }
}
