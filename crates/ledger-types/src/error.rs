//! Crate-wide error taxonomy.
//!
//! Every fallible surface in the workspace returns one of these enums
//! (never a boxed/opaque error), each carrying a stable machine-readable
//! [`ErrorCode`] so RPC layers and logs can key off the failure kind rather
//! than string-matching the `Display` text.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors from the persisted state layer (snapshots, typed caches).
#[derive(Debug, Error)]
pub enum StateError {
    /// The requested key was not found.
    #[error("key not found")]
    KeyNotFound,
    /// `add` was called for a key that already exists.
    #[error("key already exists")]
    AlreadyExists,
    /// A decode of a persisted record failed.
    #[error("decode error: {0}")]
    Decode(String),
    /// An encode of a record to be persisted failed.
    #[error("encode error: {0}")]
    Encode(String),
    /// The underlying store backend reported an error.
    #[error("store backend error: {0}")]
    Backend(String),
    /// An invariant the caller relies on (e.g. a `SpentCoin` entry that must
    /// exist for a `Claim` to reference) did not hold.
    #[error("state invariant violated: {0}")]
    InvariantViolated(String),
}

impl ErrorCode for StateError {
    fn code(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "STATE_KEY_NOT_FOUND",
            Self::AlreadyExists => "STATE_ALREADY_EXISTS",
            Self::Decode(_) => "STATE_DECODE_ERROR",
            Self::Encode(_) => "STATE_ENCODE_ERROR",
            Self::Backend(_) => "STATE_BACKEND_ERROR",
            Self::InvariantViolated(_) => "STATE_INVARIANT_VIOLATED",
        }
    }
}

/// Errors raised while validating or applying a block.
#[derive(Debug, Error)]
pub enum BlockError {
    /// `index != prev.index + 1`.
    #[error("invalid block height: expected {expected}, got {got}")]
    InvalidHeight {
        /// The height the ledger expected next.
        expected: u32,
        /// The height actually carried by the block.
        got: u32,
    },
    /// `prev_hash` does not match the hash of the block at `index - 1`.
    #[error("mismatched previous hash")]
    MismatchedPrevHash,
    /// `merkle_root != merkle(transactions)`.
    #[error("mismatched merkle root")]
    MismatchedMerkleRoot,
    /// `timestamp <= prev.timestamp`.
    #[error("non-increasing timestamp")]
    NonIncreasingTimestamp,
    /// Header or block witness failed verification.
    #[error("witness verification failed")]
    WitnessInvalid,
    /// A referenced input was already spent or does not exist.
    #[error("invalid input reference: {0}")]
    InvalidInput(String),
    /// Generic catch-all for a validation failure not covered above.
    #[error("invalid block: {0}")]
    Invalid(String),
}

impl ErrorCode for BlockError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidHeight { .. } => "BLOCK_INVALID_HEIGHT",
            Self::MismatchedPrevHash => "BLOCK_MISMATCHED_PREV_HASH",
            Self::MismatchedMerkleRoot => "BLOCK_MISMATCHED_MERKLE_ROOT",
            Self::NonIncreasingTimestamp => "BLOCK_NON_INCREASING_TIMESTAMP",
            Self::WitnessInvalid => "BLOCK_WITNESS_INVALID",
            Self::InvalidInput(_) => "BLOCK_INVALID_INPUT",
            Self::Invalid(_) => "BLOCK_INVALID",
        }
    }
}

/// Errors raised while validating a single transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The transaction is already known (in the mempool or persisted).
    #[error("transaction already exists")]
    AlreadyExists,
    /// A `Miner` transaction was submitted directly (only valid inside a block).
    #[error("miner transactions cannot be relayed")]
    MinerNotRelayable,
    /// Sum of inputs does not cover sum of outputs plus fees for some asset.
    #[error("unbalanced amounts for asset {0}")]
    Unbalanced(String),
    /// A witness failed to verify against its script hash.
    #[error("witness verification failed")]
    WitnessInvalid,
    /// Policy plugin rejected the transaction.
    #[error("policy rejected: {0}")]
    PolicyFail(String),
    /// Generic catch-all.
    #[error("invalid transaction: {0}")]
    Invalid(String),
}

impl ErrorCode for TransactionError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "TX_ALREADY_EXISTS",
            Self::MinerNotRelayable => "TX_MINER_NOT_RELAYABLE",
            Self::Unbalanced(_) => "TX_UNBALANCED",
            Self::WitnessInvalid => "TX_WITNESS_INVALID",
            Self::PolicyFail(_) => "TX_POLICY_FAIL",
            Self::Invalid(_) => "TX_INVALID",
        }
    }
}

/// Errors raised by the mempool (spec.md §4.4).
#[derive(Debug, Error)]
pub enum MempoolError {
    /// The transaction is already present.
    #[error("already exists")]
    AlreadyExists,
    /// Capacity was exceeded and the inserted transaction was itself evicted.
    #[error("out of memory")]
    OutOfMemory,
}

impl ErrorCode for MempoolError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "MEMPOOL_ALREADY_EXISTS",
            Self::OutOfMemory => "MEMPOOL_OUT_OF_MEMORY",
        }
    }
}

/// A fatal error: an invariant inside `persist` was violated, or the store
/// failed to commit. Per spec.md §7 these are not recoverable — the caller
/// must abort the process rather than continue with an inconsistent
/// snapshot.
#[derive(Debug, Error)]
pub enum FatalError {
    /// A commit to the underlying store failed.
    #[error("snapshot commit failed: {0}")]
    CommitFailed(String),
    /// A `persist` invariant (e.g. a missing `SpentCoin` entry for a
    /// `Claim`) did not hold.
    #[error("persist invariant violated: {0}")]
    InvariantViolated(String),
}

impl ErrorCode for FatalError {
    fn code(&self) -> &'static str {
        match self {
            Self::CommitFailed(_) => "FATAL_COMMIT_FAILED",
            Self::InvariantViolated(_) => "FATAL_INVARIANT_VIOLATED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_carries_a_distinct_stable_code() {
        let codes = [
            StateError::KeyNotFound.code(),
            StateError::AlreadyExists.code(),
            BlockError::MismatchedPrevHash.code(),
            TransactionError::MinerNotRelayable.code(),
            MempoolError::OutOfMemory.code(),
            FatalError::CommitFailed("x".into()).code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
