//! Transaction variants and their shared envelope.
//!
//! Every transaction carries the same envelope (inputs, outputs, attributes,
//! witnesses, fees) plus a variant-specific payload (spec.md §3). The
//! dispatcher in `ledger-core`'s persist engine matches on [`TransactionKind`]
//! (spec.md §4.5e, "heterogeneous transaction dispatch").

use crate::fixed8::Fixed8;
use crate::hash::{Hash160, Hash256, PubKey};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A reference to a previous transaction's output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct CoinReference {
    /// Hash of the transaction that created the output.
    pub prev_hash: Hash256,
    /// Index of the output within that transaction.
    pub prev_index: u16,
}

/// A transaction input: a spent coin reference.
pub type TransactionInput = CoinReference;

/// A transaction output: value of `asset_id` paid to `script_hash`.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// The asset being transferred.
    pub asset_id: Hash256,
    /// The amount transferred.
    pub value: Fixed8,
    /// The recipient's script hash.
    pub script_hash: Hash160,
}

/// An opaque, attribute-kind-tagged piece of data attached to a transaction
/// (e.g. a script URL, a remark, a contract-invocation description). Not
/// interpreted by the ledger beyond size and count limits enforced at
/// validation time.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct TransactionAttribute {
    /// The attribute kind tag.
    pub usage: u8,
    /// The attribute payload.
    pub data: Vec<u8>,
}

/// A signature witness, reused from [`crate::block::Witness`].
pub type Witness = crate::block::Witness;

/// A descriptor inside a `State` transaction: reassigns votes on an account
/// or toggles a validator's registration (spec.md §4.5e `State`).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub enum StateDescriptor {
    /// Replace `account`'s vote list with `votes`.
    Account {
        /// The voting account's script hash.
        account: Hash160,
        /// The new (deduplicated) vote list.
        votes: Vec<PubKey>,
    },
    /// Toggle a validator candidate's registration flag.
    Validator {
        /// The validator's public key.
        pubkey: PubKey,
        /// The new registration flag.
        registered: bool,
    },
}

/// Variant-specific transaction payload (spec.md §3 "Transaction variants").
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub enum TransactionKind {
    /// The first transaction of every block; carries the consensus nonce.
    /// Rejected if submitted directly to the mempool (spec.md §4.5e).
    Miner {
        /// Anti-replay / entropy nonce chosen by the block producer.
        nonce: u64,
    },
    /// Registers a new asset (spec.md §4.5e `Register`).
    Register {
        /// Human-readable asset name.
        name: String,
        /// Total issuable amount. `Fixed8(-1)` means unbounded (as for the
        /// utility token's emission schedule).
        amount: Fixed8,
        /// Decimal precision, 0-8.
        precision: u8,
        /// Registering owner's public key.
        owner: PubKey,
        /// Script hash permitted to issue more of this asset.
        admin: Hash160,
    },
    /// Issues previously registered but unissued asset supply to the
    /// transaction's outputs.
    Issue,
    /// Claims `UtilityToken` generated by the `claims` coin references
    /// (spec.md §4.5e `Claim`).
    Claim {
        /// The (already-spent) governing-token outputs being claimed
        /// against.
        claims: Vec<CoinReference>,
    },
    /// Registers the signer as a validator candidate.
    Enrollment {
        /// The candidate's public key.
        pubkey: PubKey,
    },
    /// Applies one or more [`StateDescriptor`]s (vote reassignment or
    /// validator registration toggle).
    State {
        /// The descriptors to apply, in order.
        descriptors: Vec<StateDescriptor>,
    },
    /// Deploys a new contract.
    Publish {
        /// The contract's script bytes.
        script: Vec<u8>,
        /// Bitmask of contract properties (needs-storage,
        /// needs-dynamic-invoke, payable).
        properties: u8,
        /// Human-readable contract name.
        name: String,
    },
    /// Invokes the virtual machine with `script`, metering up to
    /// `system_fee` gas (spec.md §4.5.1).
    Invocation {
        /// The script to execute.
        script: Vec<u8>,
        /// Gas budget for this invocation; equal to the envelope's
        /// `system_fee`.
        gas: Fixed8,
    },
    /// A plain value-transfer transaction with no extra payload.
    Contract,
}

impl TransactionKind {
    /// A short, stable tag used for logging and metrics.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Miner { .. } => "miner",
            Self::Register { .. } => "register",
            Self::Issue => "issue",
            Self::Claim { .. } => "claim",
            Self::Enrollment { .. } => "enrollment",
            Self::State { .. } => "state",
            Self::Publish { .. } => "publish",
            Self::Invocation { .. } => "invocation",
            Self::Contract => "contract",
        }
    }
}

/// A complete transaction: the shared envelope plus a variant payload.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct Transaction {
    /// Inputs consumed by this transaction.
    pub inputs: Vec<TransactionInput>,
    /// Outputs created by this transaction.
    pub outputs: Vec<TransactionOutput>,
    /// Opaque attributes.
    pub attributes: Vec<TransactionAttribute>,
    /// Signature witnesses, one per distinct signer script hash.
    pub witnesses: Vec<Witness>,
    /// Fee paid to the network for inclusion priority (drives mempool
    /// ordering, spec.md §4.4).
    pub network_fee: Fixed8,
    /// Fee paid for VM execution / system resource consumption.
    pub system_fee: Fixed8,
    /// The variant-specific payload.
    pub kind: TransactionKind,
}

impl Transaction {
    /// The transaction's content hash, computed over every field except the
    /// witnesses (witnesses prove the transaction; they cannot be part of
    /// what they prove).
    pub fn hash(&self) -> Hash256 {
        let unsigned = UnsignedTransaction {
            inputs: &self.inputs,
            outputs: &self.outputs,
            attributes: &self.attributes,
            network_fee: self.network_fee,
            system_fee: self.system_fee,
            kind: &self.kind,
        };
        crate::codec::double_sha256(&unsigned.encode())
    }

    /// The serialized size in bytes, used for fee-density computation
    /// (spec.md's "Fee density" glossary entry).
    pub fn size(&self) -> usize {
        self.encode().len()
    }

    /// Fee density: `network_fee / size`, the primary mempool eviction key.
    /// Returned as a rational (numerator, denominator) pair to avoid lossy
    /// floating point in an ordering key.
    pub fn fee_density(&self) -> (i64, usize) {
        (self.network_fee.0, self.size().max(1))
    }

    /// True for `Miner` transactions, which may only appear inside a block
    /// (spec.md §4.5e).
    pub fn is_miner(&self) -> bool {
        matches!(self.kind, TransactionKind::Miner { .. })
    }

    /// Per-asset net issuance implied by this transaction's outputs minus
    /// the value of the inputs it consumes (spec.md §4.5e `Issue`:
    /// "for each `TransactionResult` with negative amount"). `resolved_inputs`
    /// supplies the `TransactionOutput` each input referenced.
    pub fn transaction_results(
        &self,
        resolved_inputs: &[TransactionOutput],
    ) -> std::collections::BTreeMap<Hash256, Fixed8> {
        let mut results: std::collections::BTreeMap<Hash256, Fixed8> = Default::default();
        for input in resolved_inputs {
            *results.entry(input.asset_id).or_insert(Fixed8::ZERO) -= input.value;
        }
        for output in &self.outputs {
            *results.entry(output.asset_id).or_insert(Fixed8::ZERO) += output.value;
        }
        results
    }
}

#[derive(Encode)]
struct UnsignedTransaction<'a> {
    inputs: &'a Vec<TransactionInput>,
    outputs: &'a Vec<TransactionOutput>,
    attributes: &'a Vec<TransactionAttribute>,
    network_fee: Fixed8,
    system_fee: Fixed8,
    kind: &'a TransactionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            inputs: vec![],
            outputs: vec![TransactionOutput {
                asset_id: Hash256([1; 32]),
                value: Fixed8::from_whole(5),
                script_hash: Hash160([2; 20]),
            }],
            attributes: vec![],
            witnesses: vec![],
            network_fee: Fixed8::from_whole(1),
            system_fee: Fixed8::ZERO,
            kind: TransactionKind::Contract,
        }
    }

    #[test]
    fn hash_excludes_witnesses() {
        let mut a = sample_tx();
        let mut b = sample_tx();
        b.witnesses.push(Witness {
            invocation_script: vec![1, 2, 3],
            verification_script: vec![4, 5, 6],
        });
        assert_eq!(a.hash(), b.hash());
        a.network_fee = Fixed8::from_whole(2);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn miner_transactions_are_flagged() {
        let mut tx = sample_tx();
        tx.kind = TransactionKind::Miner { nonce: 1 };
        assert!(tx.is_miner());
    }

    #[test]
    fn transaction_results_nets_inputs_against_outputs() {
        let tx = sample_tx();
        let results = tx.transaction_results(&[]);
        assert_eq!(results[&Hash256([1; 32])], Fixed8::from_whole(5));
    }
}
