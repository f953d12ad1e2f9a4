use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::memory::MemoryType;

/// Non-destructively readable dispatcher counters (spec.md §4.5, §5).
/// Flushed into a [`super::journal::LearningDelta`] row on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCounters {
    pub memories_created: u64,
    pub memories_duplicated: u64,
    pub recall_queries: u64,
    pub search_queries: u64,
    pub web_search_queries: u64,
    pub cost_tally: f64,
    pub types_created: HashMap<MemoryType, u64>,
    pub started_at: DateTime<Utc>,
}

impl SessionCounters {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            memories_created: 0,
            memories_duplicated: 0,
            recall_queries: 0,
            search_queries: 0,
            web_search_queries: 0,
            cost_tally: 0.0,
            types_created: HashMap::new(),
            started_at,
        }
    }

    pub fn record_memory_created(&mut self, memory_type: MemoryType) {
        self.memories_created += 1;
        *self.types_created.entry(memory_type).or_insert(0) += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.memories_duplicated += 1;
    }
}
