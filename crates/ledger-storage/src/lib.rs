#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Ledger kernel storage
//!
//! The key-value [`Store`] abstraction backing every persisted entity
//! (spec.md §4.1 "C1: Storage layer"), its `redb`-backed implementation, and
//! the copy-on-write [`Snapshot`] cache layer that the persist engine and
//! the VM sandbox seam both build their per-block and per-invocation state
//! views on top of.

/// Column identifiers partitioning the flat key space into entity kinds.
pub mod column;
/// The `Store` trait and its error type.
pub mod store;
/// A `redb`-backed `Store` implementation.
pub mod redb_store;
/// The copy-on-write snapshot cache.
pub mod snapshot;
/// Typed, per-entity cache views over a `Store`.
pub mod typed_cache;

pub use column::Column;
pub use snapshot::Snapshot;
pub use store::{Store, StorageError};
