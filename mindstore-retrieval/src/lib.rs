//! Hybrid search (spec.md §4.6, component C6): fuses lexical and dense
//! retrieval, decomposes temporal phrasing into sub-queries, applies an
//! ordered chain of post-filter boosts, and diversifies the final
//! ranking with MMR.

pub mod engine;
pub mod filter_builder;
pub mod fusion;
pub mod mmr;
pub mod readiness;
pub mod scoring;
pub mod temporal_query;

pub use engine::{
    DocumentHit, DocumentSearchRequest, DocumentSearchResponse, SearchEngine, SearchHit, SearchRequest, SearchResponse,
};
pub use readiness::Readiness;
