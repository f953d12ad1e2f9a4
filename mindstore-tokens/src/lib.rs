//! # mindstore-tokens
//!
//! C1: deterministic text tokenization (code/prose variants) and a
//! content-hash-keyed embedding cache in front of an
//! [`mindstore_core::traits::EmbeddingProvider`].

pub mod cache;
pub mod tokenize;

pub use cache::EmbeddingCache;
pub use tokenize::{tokenize, Variant};
