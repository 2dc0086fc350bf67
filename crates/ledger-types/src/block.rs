//! Blocks, headers, and the trimmed (hash-only) on-disk block form.

use crate::hash::Hash256;
use crate::transaction::Transaction;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A signature witness: an invocation script (pushes signatures) paired with
/// a verification script (the redeem script the signatures must satisfy).
#[derive(Clone, PartialEq, Eq, Debug, Default, Encode, Decode, Serialize, Deserialize)]
pub struct Witness {
    /// Pushes the signature(s) onto the evaluation stack.
    pub invocation_script: Vec<u8>,
    /// The script whose hash is the signer; evaluated against the pushed
    /// signatures.
    pub verification_script: Vec<u8>,
}

/// The header of a block. Carries everything needed to validate linkage and
/// consensus witness without the transaction bodies.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of the previous block's header.
    pub prev_hash: Hash256,
    /// Root of the merkle tree over this block's transaction hashes.
    pub merkle_root: Hash256,
    /// Unix timestamp in seconds; must exceed `prev.timestamp`.
    pub timestamp: u64,
    /// Height of this block. `index == prev.index + 1`.
    pub index: u32,
    /// Opaque consensus-engine payload (nonce for genesis, dBFT view data
    /// otherwise). Not interpreted by the ledger.
    pub consensus_data: u64,
    /// Script hash of the validator set expected to sign the *next* block.
    pub next_consensus: crate::hash::Hash160,
    /// The multi-sig witness proving the previous validator set approved
    /// this header.
    pub witness: Witness,
}

impl BlockHeader {
    /// The deterministic content hash of this header (excludes the witness,
    /// as is standard: the witness proves the header, so it cannot be part
    /// of what it proves).
    pub fn hash(&self) -> Hash256 {
        let unsigned = UnsignedHeader {
            prev_hash: self.prev_hash,
            merkle_root: self.merkle_root,
            timestamp: self.timestamp,
            index: self.index,
            consensus_data: self.consensus_data,
            next_consensus: self.next_consensus,
        };
        crate::codec::double_sha256(&unsigned.encode())
    }
}

#[derive(Encode)]
struct UnsignedHeader {
    prev_hash: Hash256,
    merkle_root: Hash256,
    timestamp: u64,
    index: u32,
    consensus_data: u64,
    next_consensus: crate::hash::Hash160,
}

/// A full block: header plus transaction bodies.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transaction bodies, in canonical order (first is always the `Miner`
    /// transaction).
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The block's identity is its header's hash.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Height of this block.
    pub fn index(&self) -> u32 {
        self.header.index
    }

    /// Reduces this block to its storage form: header plus transaction
    /// hashes only (spec.md §3 `TrimmedBlock`).
    pub fn trim(&self) -> TrimmedBlock {
        TrimmedBlock {
            header: self.header.clone(),
            tx_hashes: self.transactions.iter().map(Transaction::hash).collect(),
        }
    }

    /// Recomputes the merkle root over this block's transaction hashes.
    pub fn compute_merkle_root(&self) -> Hash256 {
        merkle_root(&self.transactions.iter().map(Transaction::hash).collect::<Vec<_>>())
    }
}

/// The storage form of a block: header plus transaction hashes only.
/// Transaction bodies are looked up independently via the `Transactions`
/// cache (spec.md §3).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct TrimmedBlock {
    /// The block header.
    pub header: BlockHeader,
    /// Hashes of the transactions included in this block, in order.
    pub tx_hashes: Vec<Hash256>,
}

impl TrimmedBlock {
    /// The block's identity is its header's hash.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }
}

/// Computes a merkle root over a list of leaf hashes using the protocol's
/// pairwise double-SHA256 scheme (odd node duplicated, as in Bitcoin-lineage
/// merkle trees).
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::ZERO;
    }
    let mut level: Vec<Hash256> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().expect("non-empty: checked len() > 1 above"));
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(&pair[0].0);
                buf.extend_from_slice(&pair[1].0);
                crate::codec::double_sha256(&buf)
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merkle_root_of_single_leaf_is_itself() {
        let h = Hash256([7u8; 32]);
        assert_eq!(merkle_root(&[h]), h);
    }

    #[test]
    fn merkle_root_of_empty_is_zero() {
        assert_eq!(merkle_root(&[]), Hash256::ZERO);
    }

    #[test]
    fn merkle_root_duplicates_odd_last_leaf() {
        let a = Hash256([1u8; 32]);
        let b = Hash256([2u8; 32]);
        let c = Hash256([3u8; 32]);
        let three = merkle_root(&[a, b, c]);
        let four = merkle_root(&[a, b, c, c]);
        assert_eq!(three, four);
    }
}
