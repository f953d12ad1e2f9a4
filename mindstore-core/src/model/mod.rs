pub mod counters;
pub mod document;
pub mod journal;
pub mod links;
pub mod memory;
pub mod project;

pub use counters::SessionCounters;
pub use document::{Document, FileHash};
pub use journal::{LearningDelta, SkillEntry, TokenFrequency, TokenStat, WebSearchEntry};
pub use links::{Centrality, MemoryLink, RelationKind};
pub use memory::{GlobalMemory, Memory, MemoryType, QualityFactors};
pub use project::normalize_project_id;
