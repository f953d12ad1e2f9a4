//! Relational backend adapters for the knowledge store.
//!
//! Two `RelationalBackend` implementations — [`EmbeddedBackend`] (a
//! single SQLite file with a dedicated writer and a round-robin read
//! pool) and [`NetworkedBackend`] (a shared PostgreSQL server) — plus the
//! C9 bulk-transfer functions and the C10 freshness detector, both of
//! which operate against the trait object so they work over either
//! backend unchanged.

pub mod embedded;
pub mod freshness;
pub mod migrations;
pub mod networked;
pub mod pool;
pub mod queries;
pub mod transfer;

pub use embedded::EmbeddedBackend;
pub use networked::NetworkedBackend;
