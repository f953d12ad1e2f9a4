use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The eight relation kinds a [`MemoryLink`] edge can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Related,
    CausedBy,
    LeadsTo,
    SimilarTo,
    Contradicts,
    Implements,
    Supersedes,
    References,
}

impl RelationKind {
    pub const ALL: [RelationKind; 8] = [
        Self::Related,
        Self::CausedBy,
        Self::LeadsTo,
        Self::SimilarTo,
        Self::Contradicts,
        Self::Implements,
        Self::Supersedes,
        Self::References,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Related => "related",
            Self::CausedBy => "caused_by",
            Self::LeadsTo => "leads_to",
            Self::SimilarTo => "similar_to",
            Self::Contradicts => "contradicts",
            Self::Implements => "implements",
            Self::Supersedes => "supersedes",
            Self::References => "references",
        }
    }
}

impl std::str::FromStr for RelationKind {
    type Err = crate::errors::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "related" => Ok(Self::Related),
            "caused_by" => Ok(Self::CausedBy),
            "leads_to" => Ok(Self::LeadsTo),
            "similar_to" => Ok(Self::SimilarTo),
            "contradicts" => Ok(Self::Contradicts),
            "implements" => Ok(Self::Implements),
            "supersedes" => Ok(Self::Supersedes),
            "references" => Ok(Self::References),
            other => Err(crate::errors::ValidationError::UnknownRelation {
                value: other.to_string(),
            }),
        }
    }
}

/// A directed, typed edge between two memories.
///
/// `(source_id, target_id, relation)` is unique. A link is effective under
/// the same validity rule as a [`crate::model::Memory`] — it is never
/// hard-deleted while `llm_enriched` is set; invalidation only sets
/// `valid_until`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryLink {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub relation: RelationKind,
    pub weight: f64,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub llm_enriched: bool,
    pub created_at: DateTime<Utc>,
}

impl MemoryLink {
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if from > at {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if until <= at {
                return false;
            }
        }
        true
    }

    pub fn is_effective_now(&self) -> bool {
        self.is_effective_at(Utc::now())
    }
}

/// Per-memory centrality scalar maintained by the graph's background sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Centrality {
    pub memory_id: i64,
    pub degree: u32,
    pub normalized_degree: f64,
}
