//! Temporal model (spec.md §4.8): duration parsing and decay-weighted
//! quality scoring. Validity predicates and as-of semantics live directly
//! on [`mindstore_core::model::Memory`]/`MemoryLink` since they need no
//! state beyond the row itself.

pub mod decay;
pub mod duration;

pub use decay::{weighted_quality, DecayParams};
pub use duration::resolve as resolve_duration;
