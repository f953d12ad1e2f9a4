//! Error taxonomy (spec.md §7). Each subsystem gets its own `thiserror`
//! enum, matching the split in the teacher's `cortex-core::errors` module;
//! they aggregate into [`MindstoreError`] via `#[from]`.
//!
//! `NotFound` is deliberately not a variant here: per spec, "not found" is
//! `Option::None`, never an error.

use serde::{Deserialize, Serialize};

/// Fatal at startup; never caught by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config key: {key}")]
    MissingKey { key: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("unknown storage backend: {value}")]
    UnknownBackend { value: String },

    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },
}

/// Caller-supplied bad input. Surfaced unchanged, never retried.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown memory type: {value}")]
    UnknownMemoryType { value: String },

    #[error("unknown relation: {value}")]
    UnknownRelation { value: String },

    #[error("malformed duration: {value}")]
    MalformedDuration { value: String },

    #[error("a memory cannot link to itself: {id}")]
    SelfLink { id: i64 },

    #[error("empty content")]
    EmptyContent,
}

/// Unique-constraint violation. The dispatcher translates these into
/// idempotent upsert behavior where the contract allows it.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ConflictError {
    #[error("document already exists at {file_path}#{chunk_index}")]
    DuplicateChunk { file_path: String, chunk_index: u32 },

    #[error("link already exists: {source_id} -> {target_id} ({relation})")]
    DuplicateLink {
        source_id: i64,
        target_id: i64,
        relation: String,
    },
}

/// Network blip or lock timeout. The dispatcher retries once with a 1s
/// pause inside the same call before surfacing this.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    Sqlite { message: String },

    #[error("postgres error: {message}")]
    Postgres { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("connection pool exhausted: {active} active connections")]
    PoolExhausted { active: usize },

    #[error("required table or index missing: {name}")]
    SchemaMissing { name: String },

    #[error("transaction rolled back: {reason}")]
    TransactionFailed { reason: String },

    #[error("serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("filesystem error: {message}")]
    Io { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("vector backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("collection schema is outdated and needs a re-index: {collection}")]
    SchemaOutdated { collection: String },

    #[error("upsert failed: {reason}")]
    UpsertFailed { reason: String },

    #[error("search failed: {reason}")]
    SearchFailed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("no candidates passed the score threshold")]
    NoResults,

    #[error("search failed: {reason}")]
    SearchFailed { reason: String },

    #[error("ranking failed: {reason}")]
    RankingFailed { reason: String },
}

/// A feature not available on the current backend/schema. The dispatcher
/// catches this and falls back to the next strategy; it should rarely
/// reach a caller.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("unsupported on this backend: {0}")]
pub struct Unsupported(pub String);

/// Cross-store inconsistency after a successful relational write. Not a
/// failure — the write already returned success — but logged and carried
/// back to the caller as a flag so a backfill can be scheduled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftWarning {
    pub operation: String,
    pub reason: String,
}

impl DriftWarning {
    pub fn new(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level aggregate error. The dispatcher's public functions return
/// `MindstoreResult<T>`.
#[derive(Debug, thiserror::Error)]
pub enum MindstoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Unsupported(#[from] Unsupported),

    #[error("transient backend error (retried once): {0}")]
    Transient(String),

    #[error("operation cancelled before completion")]
    Cancelled,
}

pub type MindstoreResult<T> = Result<T, MindstoreError>;
