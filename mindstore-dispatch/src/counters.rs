//! Per-session counters (spec.md §4.5, §5). One [`SessionCounters`] per
//! dispatcher singleton behind a single lock — "Session counters |
//! saveMemory, search, flush | getSessionCounters | single lock" in the
//! concurrency table, not the teacher's `DashMap`-keyed multi-session
//! model (that model has no counterpart here; see DESIGN.md).

use std::sync::Mutex;

use chrono::Utc;
use mindstore_core::model::{MemoryType, SessionCounters};

pub struct CounterHandle {
    inner: Mutex<SessionCounters>,
}

impl CounterHandle {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SessionCounters::new(Utc::now())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionCounters> {
        self.inner.lock().expect("session counters lock poisoned")
    }

    pub fn record_memory_created(&self, memory_type: MemoryType) {
        self.lock().record_memory_created(memory_type);
    }

    pub fn record_duplicate(&self) {
        self.lock().record_duplicate();
    }

    pub fn record_recall_query(&self) {
        self.lock().recall_queries += 1;
    }

    pub fn record_search_query(&self) {
        self.lock().search_queries += 1;
    }

    pub fn record_web_search_query(&self) {
        self.lock().web_search_queries += 1;
    }

    pub fn add_cost(&self, amount: f64) {
        self.lock().cost_tally += amount;
    }

    /// Non-destructive read (spec.md: "Counters are non-destructively
    /// readable").
    pub fn snapshot(&self) -> SessionCounters {
        self.lock().clone()
    }

    /// Snapshots the current counters and resets them, starting a fresh
    /// accounting window. Building and persisting the `LearningDelta` row
    /// from this snapshot is the caller's job (`Engine::flush_session_counters`),
    /// since this handle has no view of the relational backend or of
    /// individual memory quality scores.
    pub fn flush(&self) -> SessionCounters {
        let mut guard = self.lock();
        let snapshot = guard.clone();
        *guard = SessionCounters::new(Utc::now());
        snapshot
    }
}

impl Default for CounterHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_memory_created_bumps_total_and_per_type() {
        let counters = CounterHandle::new();
        counters.record_memory_created(MemoryType::Observation);
        counters.record_memory_created(MemoryType::Observation);
        counters.record_memory_created(MemoryType::Decision);
        let snap = counters.snapshot();
        assert_eq!(snap.memories_created, 3);
        assert_eq!(snap.types_created[&MemoryType::Observation], 2);
        assert_eq!(snap.types_created[&MemoryType::Decision], 1);
    }

    #[test]
    fn flush_resets_counters_and_returns_snapshot() {
        let counters = CounterHandle::new();
        counters.record_memory_created(MemoryType::Learning);
        counters.record_duplicate();
        let snapshot = counters.flush();
        assert_eq!(snapshot.memories_created, 1);
        assert_eq!(snapshot.memories_duplicated, 1);
        assert_eq!(counters.snapshot().memories_created, 0);
    }
}
