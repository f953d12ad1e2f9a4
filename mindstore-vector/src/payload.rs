//! Re-exports the canonical payload builders from `mindstore-core`, where
//! they live so `mindstore-storage`'s backfill can reuse them too without
//! a dependency cycle back through this crate. Kept as a module here
//! (rather than inlining the `mindstore_core::payload` path at every call
//! site) so existing `mindstore_vector::payload::*` callers are unaffected.

pub use mindstore_core::payload::{document_payload, memory_payload};
