use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only "n memories added, m types, avg quality q" snapshot. Never
/// mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningDelta {
    pub id: i64,
    pub source: String,
    pub memories_added: u64,
    pub distinct_types: u32,
    pub avg_quality: f64,
    pub created_at: DateTime<Utc>,
}

/// One row of the lexical scorer's persisted token statistics (global
/// document frequency for a token within a scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStat {
    pub scope: String,
    pub token: String,
    pub document_frequency: u64,
    pub total_documents: u64,
}

/// Raw token occurrence count, used for observability (bytes saved vs. the
/// raw source feed) rather than ranking itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenFrequency {
    pub project_id: Option<String>,
    pub token: String,
    pub occurrences: u64,
}

/// One web search an assistant ran on a project's behalf. Kept as an
/// opaque payload (query, results, whatever the caller recorded) rather
/// than a typed shape — the RPC surface that would populate this richly
/// is out of scope here, but the storage surface still needs somewhere
/// for these rows to land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchEntry {
    pub id: i64,
    pub project_id: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// One learned skill/procedure, same opaque-payload shape as
/// [`WebSearchEntry`] and grounded on the same reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub id: i64,
    pub project_id: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
