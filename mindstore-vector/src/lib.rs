//! Vector index adapters (spec.md §4.4): [`builtin::BuiltinVectorIndex`]
//! wraps the relational backend directly with brute-force cosine scoring,
//! [`qdrant::QdrantVectorIndex`] drives a standalone Qdrant collection with
//! named dense and sparse vectors for genuine hybrid search.

pub mod builtin;
pub mod filter_eval;
pub mod payload;
pub mod qdrant;
pub mod sparse;

pub use builtin::BuiltinVectorIndex;
pub use qdrant::QdrantVectorIndex;
