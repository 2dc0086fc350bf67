//! Deterministic genesis block construction (spec.md §6 "Genesis").
//!
//! The genesis block is hard-coded, not negotiated: every node that starts
//! from an empty store must derive byte-identical genesis state from the
//! same `standby_validators` list, since `header_index[0] == genesis.hash`
//! is a chain-wide invariant (spec.md §8).

use ledger_crypto::multisig::{consensus_address, majority_quorum, multisig_address};
use ledger_crypto::CryptoError;
use ledger_types::prelude::*;
use ledger_types::transaction::TransactionOutput;
use ledger_types::Hash160;

/// Consensus-data nonce and `MinerTransaction` nonce the genesis block
/// carries (spec.md §6, "`consensus_data = 2083236893`").
pub const GENESIS_NONCE: u64 = 2_083_236_893;

/// Unix timestamp hard-coded into the genesis header. Fixed so every node
/// derives the same genesis hash.
pub const GENESIS_TIMESTAMP: u64 = 1_468_595_301;

/// A placeholder public key used as the `owner` of the two genesis asset
/// registrations, neither of which is ever re-issued by a signed owner
/// action: the governing token is issued once in full by this same genesis
/// block, and the utility token is only ever minted by `Claim` transactions
/// computed from the emission schedule.
const NO_OWNER: PubKey = PubKey([0u8; 33]);

/// Builds the genesis block for a validator set of `standby_validators`.
///
/// Structure (spec.md §6):
/// 1. `Miner { nonce: GENESIS_NONCE }`.
/// 2. `Register(GoverningToken, amount = 100_000_000)`.
/// 3. `Register(UtilityToken, amount = Σ GENERATION_AMOUNT · DECREMENT_INTERVAL)`.
/// 4. `Issue` of the entire governing-token supply to the
///    `⌈(n+1)/2⌉`-of-`n` multi-sig address over `standby_validators`.
///
/// The header's `next_consensus` is the Byzantine-quorum (`n - (n-1)/3`)
/// multi-sig address over the same validator set (spec.md §6 "Consensus
/// address").
pub fn build_genesis_block(standby_validators: &[PubKey]) -> Result<Block, CryptoError> {
    let miner = Transaction {
        inputs: vec![],
        outputs: vec![],
        attributes: vec![],
        witnesses: vec![],
        network_fee: Fixed8::ZERO,
        system_fee: Fixed8::ZERO,
        kind: TransactionKind::Miner { nonce: GENESIS_NONCE },
    };

    let register_governing = Transaction {
        inputs: vec![],
        outputs: vec![],
        attributes: vec![],
        witnesses: vec![],
        network_fee: Fixed8::ZERO,
        system_fee: Fixed8::ZERO,
        kind: TransactionKind::Register {
            name: "GoverningToken".to_string(),
            amount: Fixed8::from_whole(100_000_000),
            precision: 0,
            owner: NO_OWNER,
            admin: Hash160::default(),
        },
    };
    let governing_token_id = register_governing.hash();

    let total_utility_supply: u32 = ledger_types::constants::GENERATION_AMOUNT
        .iter()
        .map(|&per_block| per_block * ledger_types::constants::DECREMENT_INTERVAL)
        .sum();
    let register_utility = Transaction {
        inputs: vec![],
        outputs: vec![],
        attributes: vec![],
        witnesses: vec![],
        network_fee: Fixed8::ZERO,
        system_fee: Fixed8::ZERO,
        kind: TransactionKind::Register {
            name: "UtilityToken".to_string(),
            amount: Fixed8::from_whole(total_utility_supply as i64),
            precision: 8,
            owner: NO_OWNER,
            admin: Hash160::default(),
        },
    };

    let issuance_m = majority_quorum(standby_validators.len());
    let issuance_address = multisig_address(standby_validators, issuance_m)?;
    let issue = Transaction {
        inputs: vec![],
        outputs: vec![TransactionOutput {
            asset_id: governing_token_id,
            value: Fixed8::from_whole(100_000_000),
            script_hash: issuance_address,
        }],
        attributes: vec![],
        witnesses: vec![],
        network_fee: Fixed8::ZERO,
        system_fee: Fixed8::ZERO,
        kind: TransactionKind::Issue,
    };

    let next_consensus = consensus_address(standby_validators)?;
    let transactions = vec![miner, register_governing, register_utility, issue];
    let merkle_root = ledger_types::block::merkle_root(
        &transactions.iter().map(Transaction::hash).collect::<Vec<_>>(),
    );

    let header = BlockHeader {
        prev_hash: Hash256::ZERO,
        merkle_root,
        timestamp: GENESIS_TIMESTAMP,
        index: 0,
        consensus_data: GENESIS_NONCE,
        next_consensus,
        witness: Witness::default(),
    };

    Ok(Block { header, transactions })
}

/// The asset id of the governing token minted by `genesis`: the hash of its
/// `Register` transaction (the second transaction in the block).
pub fn governing_token_id(genesis: &Block) -> Hash256 {
    genesis.transactions[1].hash()
}

/// The asset id of the utility token minted by `genesis`: the hash of its
/// `Register` transaction (the third transaction in the block).
pub fn utility_token_id(genesis: &Block) -> Hash256 {
    genesis.transactions[2].hash()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validators(n: u8) -> Vec<PubKey> {
        (0..n)
            .map(|i| {
                let mut bytes = [0u8; 33];
                bytes[0] = 0x02;
                bytes[1] = i;
                PubKey(bytes)
            })
            .collect()
    }

    #[test]
    fn genesis_is_deterministic_for_the_same_validator_set() {
        let a = build_genesis_block(&validators(7)).expect("build genesis");
        let b = build_genesis_block(&validators(7)).expect("build genesis");
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn genesis_carries_the_four_expected_transactions_in_order() {
        let block = build_genesis_block(&validators(4)).expect("build genesis");
        assert_eq!(block.transactions.len(), 4);
        assert!(block.transactions[0].is_miner());
        assert!(matches!(block.transactions[1].kind, TransactionKind::Register { .. }));
        assert!(matches!(block.transactions[2].kind, TransactionKind::Register { .. }));
        assert!(matches!(block.transactions[3].kind, TransactionKind::Issue));
    }

    #[test]
    fn issue_mints_the_full_governing_supply_to_the_majority_multisig_address() {
        let validators = validators(7);
        let block = build_genesis_block(&validators).expect("build genesis");
        let issue = &block.transactions[3];
        assert_eq!(issue.outputs.len(), 1);
        assert_eq!(issue.outputs[0].value, Fixed8::from_whole(100_000_000));
        assert_eq!(issue.outputs[0].asset_id, governing_token_id(&block));

        let expected_address = multisig_address(&validators, majority_quorum(7)).expect("address");
        assert_eq!(issue.outputs[0].script_hash, expected_address);
    }

    #[test]
    fn header_next_consensus_uses_the_byzantine_quorum_address() {
        let validators = validators(7);
        let block = build_genesis_block(&validators).expect("build genesis");
        let expected = consensus_address(&validators).expect("address");
        assert_eq!(block.header.next_consensus, expected);
    }
}
