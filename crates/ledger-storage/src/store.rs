//! The `Store` trait: a minimal key-value abstraction every persisted
//! entity cache builds on, and which both the `redb` backend and the
//! in-memory [`crate::snapshot::Snapshot`] overlay implement (spec.md §4.1).

use crate::column::Column;
use ledger_types::error::ErrorCode;
use thiserror::Error;

/// Errors from the key-value store backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying backend (e.g. `redb`) reported an error.
    #[error("store backend error: {0}")]
    Backend(String),
    /// A commit of buffered writes failed partway through.
    #[error("commit failed: {0}")]
    CommitFailed(String),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "STORAGE_BACKEND_ERROR",
            Self::CommitFailed(_) => "STORAGE_COMMIT_FAILED",
        }
    }
}

/// A flat, column-partitioned key-value store.
///
/// Implementors need only support single-key reads/writes and ordered
/// prefix scans; everything else (typed caches, copy-on-write snapshots)
/// is layered on top in this crate.
pub trait Store: Send + Sync {
    /// Reads the raw bytes at `key` within `column`, if present.
    fn get_raw(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Writes `value` at `key` within `column`, overwriting any existing
    /// value.
    fn put_raw(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Removes `key` within `column`, if present.
    fn delete_raw(&self, column: Column, key: &[u8]) -> Result<(), StorageError>;

    /// Returns every `(key, value)` pair within `column` whose key starts
    /// with `prefix`, in ascending key order.
    fn scan_prefix(
        &self,
        column: Column,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
}
