#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Ledger kernel types
//!
//! Foundational data structures shared by every other crate in the
//! workspace: content hashes, the fixed-point money type, block and
//! transaction shapes, the persisted entity model, and the crate-wide error
//! taxonomy.
//!
//! As the base crate, `ledger-types` has minimal dependencies and is a
//! dependency of almost everything else; this keeps the dependency graph
//! acyclic and gives every crate a single, stable vocabulary for `Hash256`,
//! `Block`, `AccountState`, and friends.

/// Content hashes, script hashes, and public keys.
pub mod hash;
/// `Fixed8`, the signed 64-bit fixed-point money type.
pub mod fixed8;
/// Blocks, headers, and the trimmed on-disk block form.
pub mod block;
/// Transaction variants, inputs/outputs, attributes, and witnesses.
pub mod transaction;
/// Persisted entity state: accounts, assets, validators, contracts, coins.
pub mod entities;
/// The canonical length-prefixed binary codec used for persisted records.
pub mod codec;
/// Protocol-wide constants (`DECREMENT_INTERVAL`, `MAX_VALIDATORS`, ...).
pub mod constants;
/// The crate-wide error taxonomy and the `ErrorCode` trait.
pub mod error;

pub use fixed8::Fixed8;
pub use hash::{Hash160, Hash256, PubKey};

/// A block height. Genesis is height 0.
pub type Height = u32;

/// A curated set of the most commonly used types.
pub mod prelude {
    pub use crate::block::{Block, BlockHeader, TrimmedBlock, Witness};
    pub use crate::entities::{
        AccountState, AssetState, BlockRecord, ContractState, HashIndexState, HeaderHashList,
        SpentCoinState, StorageItem, StorageKey, TransactionRecord, UnspentCoinState,
        ValidatorState, ValidatorsCountState,
    };
    pub use crate::error::{BlockError, ErrorCode, StateError, TransactionError};
    pub use crate::fixed8::Fixed8;
    pub use crate::hash::{Hash160, Hash256, PubKey};
    pub use crate::transaction::{Transaction, TransactionKind};
    pub use crate::Height;
}
