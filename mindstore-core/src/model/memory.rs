use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The six kinds a memory can carry. `DeadEnd` and the `dead-end` tag both
/// trigger the hybrid-search dead-end boost (spec.md §4.6 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Observation,
    Decision,
    Learning,
    Error,
    Pattern,
    DeadEnd,
}

impl MemoryType {
    pub const ALL: [MemoryType; 6] = [
        Self::Observation,
        Self::Decision,
        Self::Learning,
        Self::Error,
        Self::Pattern,
        Self::DeadEnd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Decision => "decision",
            Self::Learning => "learning",
            Self::Error => "error",
            Self::Pattern => "pattern",
            Self::DeadEnd => "dead_end",
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = crate::errors::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observation" => Ok(Self::Observation),
            "decision" => Ok(Self::Decision),
            "learning" => Ok(Self::Learning),
            "error" => Ok(Self::Error),
            "pattern" => Ok(Self::Pattern),
            "dead_end" => Ok(Self::DeadEnd),
            other => Err(crate::errors::ValidationError::UnknownMemoryType {
                value: other.to_string(),
            }),
        }
    }
}

/// Named sub-scores contributing to `quality_score` (e.g. `"specificity"`,
/// `"corroboration"`). The aggregate score is computed by the retention
/// subsystem (outside this crate) and stored alongside the factors.
pub type QualityFactors = HashMap<String, f64>;

/// A semantic note, the unit the memory graph and hybrid search operate
/// over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub content: String,
    pub tags: Vec<String>,
    pub source: String,
    pub memory_type: MemoryType,
    pub quality_score: f64,
    pub quality_factors: QualityFactors,
    pub embedding: Option<Vec<f32>>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Id of the newer memory that supersedes this one, if invalidated.
    pub invalidated_by: Option<i64>,
}

impl Memory {
    /// A memory is effective at `at` when it hasn't been invalidated and
    /// `at` falls within `[valid_from, valid_until)`.
    ///
    /// Point-in-time queries (spec.md §4.8) replace "now" with `at` here
    /// but still apply the `invalidated_by` check — a memory invalidated
    /// after `at` is still excluded, which is this system's documented
    /// choice for the Open Question "does as-of mean validity or knowledge
    /// horizon" (see DESIGN.md).
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        if self.invalidated_by.is_some() {
            return false;
        }
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

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_dead_end(&self) -> bool {
        self.memory_type == MemoryType::DeadEnd || self.has_tag("dead-end")
    }
}

/// Same shape as [`Memory`] but scoped to no project (shared across
/// projects). Kept as a distinct type, not a type alias, so storage
/// drivers can route it to a separate namespace/table without a runtime
/// project-id check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalMemory(pub Memory);

impl std::ops::Deref for GlobalMemory {
    type Target = Memory;
    fn deref(&self) -> &Memory {
        &self.0
    }
}

impl std::ops::DerefMut for GlobalMemory {
    fn deref_mut(&mut self) -> &mut Memory {
        &mut self.0
    }
}
