/// Crate version, surfaced in export envelopes.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// BM25 term frequency saturation parameter (spec-fixed, not configurable).
pub const BM25_K1: f64 = 1.2;

/// BM25 length normalization parameter (spec-fixed, not configurable).
pub const BM25_B: f64 = 0.75;

/// RRF smoothing constant. Spec §9 leaves tunability as an open question;
/// DESIGN.md records the decision to keep it fixed for now.
pub const RRF_K: u32 = 60;

/// Dense-similarity threshold above which `saveMemory` treats a candidate
/// as a duplicate.
pub const DEDUP_SIMILARITY_THRESHOLD: f32 = 0.95;

/// Default vector batch size for external-engine upserts.
pub const VECTOR_BATCH_SIZE: usize = 100;

/// Default `findConnected` traversal depth.
pub const DEFAULT_GRAPH_DEPTH: usize = 2;

/// Default dead-end score boost (`dead_end_boost` in config).
pub const DEFAULT_DEAD_END_BOOST: f64 = 0.15;

/// Default chunking parameters for document ingest.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Default relational connection pool size (both backends).
pub const DEFAULT_POOL_SIZE: usize = 10;

/// HNSW parameters for the external vector engine.
pub const HNSW_M: u64 = 16;
pub const HNSW_EF_CONSTRUCT: u64 = 100;
pub const HNSW_SEARCH_EF: u64 = 128;
