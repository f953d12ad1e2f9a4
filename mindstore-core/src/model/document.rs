use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chunk of text extracted from one source file.
///
/// `(file_path, chunk_index)` is unique; deleting by `file_path` removes
/// every chunk belonging to that file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: i64,
    /// Project-relative path. Carries a `code:` prefix when the chunk is
    /// source code rather than prose documentation.
    pub file_path: String,
    pub chunk_index: u32,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Whether this chunk's `file_path` carries the `code:` prefix.
    pub fn is_code(&self) -> bool {
        self.file_path.starts_with("code:")
    }

    /// The file path with any `code:` prefix stripped.
    pub fn bare_path(&self) -> &str {
        self.file_path.strip_prefix("code:").unwrap_or(&self.file_path)
    }
}

/// Per-file content hash and last-indexed timestamp, used by the freshness
/// detector to decide whether a file needs re-embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileHash {
    pub file_path: String,
    pub content_hash: String,
    pub indexed_at: DateTime<Utc>,
}
