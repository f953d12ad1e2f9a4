//! The dispatcher (spec.md §4.5, component C5): the single entry point
//! holding the relational driver, the vector mode, the lexical index, the
//! memory graph, and hybrid search, with cancellation and per-session
//! counters wired over all of them.

pub mod cancellation;
pub mod counters;
pub mod engine;

pub use engine::{Engine, SaveMemoriesBatchResult, SaveMemoryOptions, SaveMemoryResult};
