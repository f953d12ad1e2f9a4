use serde::{Deserialize, Serialize};

/// The four corpora a lexical index tracks independently (spec.md §4.2).
/// Each scope has its own postings, document-length stats, and dirty
/// flag — a rebuild of one never touches the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    ProjectCode,
    ProjectDocs,
    ProjectMemories,
    GlobalMemories,
}

impl Scope {
    pub const ALL: [Scope; 4] = [
        Scope::ProjectCode,
        Scope::ProjectDocs,
        Scope::ProjectMemories,
        Scope::GlobalMemories,
    ];

    /// Code scopes tokenize with the camelCase-aware variant; everything
    /// else is prose.
    pub fn token_variant(self) -> mindstore_tokens::Variant {
        match self {
            Scope::ProjectCode => mindstore_tokens::Variant::Code,
            Scope::ProjectDocs | Scope::ProjectMemories | Scope::GlobalMemories => {
                mindstore_tokens::Variant::Prose
            }
        }
    }
}
