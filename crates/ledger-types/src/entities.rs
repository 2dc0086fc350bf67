//! Persisted entity state: the typed records stored in and retrieved from
//! the snapshot caches (spec.md §3, §4.1).

use crate::fixed8::Fixed8;
use crate::hash::{Hash160, Hash256, PubKey};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An unspent output recorded for a transaction, tracked per-output-index so
/// a transaction can be partially spent (spec.md §3 `UnspentCoinState`).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct UnspentCoinState {
    /// `true` at index `i` while output `i` of the owning transaction is
    /// still unspent.
    pub items: Vec<bool>,
}

impl UnspentCoinState {
    /// True once every output has been spent; the entry can then be pruned.
    pub fn is_fully_spent(&self) -> bool {
        self.items.iter().all(|&unspent| !unspent)
    }
}

/// Per-output record of the block height at which a governing-token output
/// was spent, retained so a later `Claim` can compute the generated
/// utility-token amount (spec.md §3 `SpentCoinState`).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct SpentCoinState {
    /// Height at which the owning transaction was included in a block.
    pub transaction_height: u32,
    /// `(output_index, height_spent)` pairs, one per spent output.
    pub items: Vec<(u16, u32)>,
}

/// An account's balances and votes (spec.md §3 `AccountState`).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize, Default)]
pub struct AccountState {
    /// `true` once this account has spent or received any value; accounts
    /// may be pruned from storage when this is `false` and all balances
    /// are zero.
    pub is_frozen: bool,
    /// Balances by asset id.
    pub balances: BTreeMap<Hash256, Fixed8>,
    /// Public keys this account currently votes for.
    pub votes: Vec<PubKey>,
}

impl AccountState {
    /// True if the account holds no balances and casts no votes, and is
    /// therefore eligible for pruning.
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty() && self.balances.values().all(Fixed8::is_zero)
    }
}

/// A registered asset's immutable definition plus its mutable issuance
/// counter (spec.md §3 `AssetState`).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct AssetState {
    /// The defining `Register` transaction's hash; also this asset's id.
    pub asset_id: Hash256,
    /// Human-readable name.
    pub name: String,
    /// Total issuable amount; negative means unbounded.
    pub amount: Fixed8,
    /// Amount issued to date.
    pub available: Fixed8,
    /// Decimal precision.
    pub precision: u8,
    /// Owning public key.
    pub owner: PubKey,
    /// Script hash permitted to issue more supply.
    pub admin: Hash160,
    /// Height at which this asset record expires (renewable); `0` for
    /// assets with no expiry.
    pub expiration: u32,
    /// Set once the asset has been explicitly revoked.
    pub is_frozen: bool,
}

/// A validator candidate (spec.md §3 `ValidatorState`).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct ValidatorState {
    /// The candidate's public key.
    pub pubkey: PubKey,
    /// `true` while actively registered; votes persist even after
    /// unregistering until they net to zero.
    pub registered: bool,
    /// Total governing-token votes currently assigned to this candidate.
    pub votes: Fixed8,
}

/// Tracks the community-voted count of active validators, keyed by the
/// distribution of vote counts submitted in `State` transactions (spec.md
/// §3 `ValidatorsCountState`).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct ValidatorsCountState {
    /// `votes[i]` accumulates the governing-token weight of every account
    /// that voted for exactly `i + 1` validators.
    pub votes: Vec<Fixed8>,
}

impl Default for ValidatorsCountState {
    fn default() -> Self {
        Self {
            votes: vec![Fixed8::ZERO; crate::constants::MAX_VALIDATORS as usize],
        }
    }
}

/// A deployed contract's script and declared property bits (spec.md §3
/// `ContractState`).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct ContractState {
    /// The contract's executable script.
    pub script: Vec<u8>,
    /// Property bitmask (needs-storage, needs-dynamic-invoke, payable).
    pub properties: u8,
    /// Human-readable name.
    pub name: String,
}

impl ContractState {
    /// Bit 0: the contract may read and write its own storage area.
    pub fn has_storage(&self) -> bool {
        self.properties & 0b001 != 0
    }

    /// Bit 1: the contract may invoke other contracts dynamically.
    pub fn has_dynamic_invoke(&self) -> bool {
        self.properties & 0b010 != 0
    }

    /// Bit 2: the contract may receive assets directly.
    pub fn is_payable(&self) -> bool {
        self.properties & 0b100 != 0
    }
}

/// A key into a contract's private storage area (spec.md §3 `StorageKey`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct StorageKey {
    /// The owning contract's script hash.
    pub contract: Hash160,
    /// The caller-chosen key bytes.
    pub key: Vec<u8>,
}

/// A value in a contract's private storage area (spec.md §3 `StorageItem`).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize, Default)]
pub struct StorageItem {
    /// The stored bytes.
    pub value: Vec<u8>,
    /// `true` once this key can no longer be overwritten (NVM `Constant`
    /// storage context flag).
    pub is_constant: bool,
}

/// The current head pointer for either the header chain or the block
/// chain: a hash plus the height it sits at (spec.md §3 `HashIndexState`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct HashIndexState {
    /// Hash of the current head.
    pub hash: Hash256,
    /// Height of the current head.
    pub index: u32,
}

impl Default for HashIndexState {
    fn default() -> Self {
        Self {
            hash: Hash256::ZERO,
            index: 0,
        }
    }
}

/// One persisted batch of 2000 consecutive header hashes (spec.md §4.3,
/// "`HeaderHashList` batches").
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct HeaderHashList {
    /// The hashes in this batch, in height order.
    pub hashes: Vec<Hash256>,
}

/// The number of header hashes grouped into a single persisted
/// `HeaderHashList` record.
pub const HEADER_HASH_BATCH_SIZE: usize = 2000;

/// The persisted form of a block record in the `Blocks` cache: the trimmed
/// block plus the running total system fee through this height (spec.md
/// §4.5 step 1).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct BlockRecord {
    /// `prev.system_fee + Σ tx.system_fee` over this block's transactions.
    pub system_fee: Fixed8,
    /// The trimmed (hash-only) block.
    pub trimmed: crate::block::TrimmedBlock,
}

/// The persisted form of a transaction record in the `Transactions` cache:
/// the full transaction plus the height of the block that included it
/// (spec.md §4.5 step 2a).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Height of the including block.
    pub block_index: u32,
    /// The full transaction body.
    pub transaction: crate::transaction::Transaction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspent_coin_state_detects_full_spend() {
        let mut s = UnspentCoinState {
            items: vec![true, true],
        };
        assert!(!s.is_fully_spent());
        s.items = vec![false, false];
        assert!(s.is_fully_spent());
    }

    #[test]
    fn account_state_empty_when_no_balance_or_votes() {
        let account = AccountState::default();
        assert!(account.is_empty());
    }

    #[test]
    fn contract_property_bits_decode_independently() {
        let c = ContractState {
            script: vec![],
            properties: 0b101,
            name: "x".into(),
        };
        assert!(c.has_storage());
        assert!(!c.has_dynamic_invoke());
        assert!(c.is_payable());
    }
}
