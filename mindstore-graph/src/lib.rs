//! Memory graph (spec.md §4.7): link CRUD, invalidation, BFS traversal,
//! auto-linking by similarity, and centrality scoring, built directly on
//! top of [`mindstore_core::traits::RelationalBackend`] and
//! [`mindstore_core::traits::vector::VectorIndex`].

pub mod engine;
pub mod indexed_graph;
pub mod traversal;

pub use engine::{GraphStats, MemoryGraph};
