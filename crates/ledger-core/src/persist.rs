//! The deterministic persist engine (spec.md §4.5 "C5").
//!
//! `persist` is the sole state-transition function: given a block and a
//! fresh [`Snapshot`] over the root store, it applies every transaction's
//! effects, commits, and reports what happened. Every invariant violation
//! encountered here is fatal (spec.md §7): the caller must abort rather
//! than continue with an inconsistent snapshot.

use crate::vm::{ExecutionOutcome, ScriptEngine};
use ledger_state::{balances, coins, votes};
use ledger_storage::typed_cache::TypedCache;
use ledger_storage::{Column, Snapshot, Store};
use ledger_types::error::FatalError;
use ledger_types::prelude::*;
use ledger_types::transaction::{StateDescriptor, TransactionOutput};
use std::sync::Arc;

/// The result of executing one `Invocation` transaction, reported
/// regardless of success (spec.md §4.5.1).
#[derive(Clone, Debug)]
pub struct ApplicationExecutionResult {
    /// The invoking transaction's hash.
    pub tx_hash: Hash256,
    /// What the engine reported.
    pub outcome: ExecutionOutcome,
}

/// Everything `persist` produced for one block, for the dispatcher (C6) to
/// act on: extend the in-memory header chain if this block arrived ahead
/// of a matching header, and notify subscribers.
#[derive(Clone, Debug)]
pub struct PersistOutcome {
    /// The persisted block's hash.
    pub block_hash: Hash256,
    /// Cumulative system fee through this block (`BlockRecord.system_fee`).
    pub system_fee: Fixed8,
    /// `true` if this block's height equalled the header chain's length
    /// when persisted, meaning the dispatcher must append `block_hash` to
    /// the in-memory header index itself (spec.md §4.5 step 3).
    pub extends_header_chain: bool,
    /// One entry per `Invocation` transaction in the block, in order.
    pub application_results: Vec<ApplicationExecutionResult>,
}

/// Applies `block` against a fresh snapshot over `store`, committing on
/// success.
///
/// `prev_system_fee` is the previous block's cumulative system fee (zero
/// for genesis). `header_chain_len` is the header chain manager's current
/// length, used for the step-3 fast-path check. `governing_token` and
/// `utility_token` are the asset ids minted by the genesis block's
/// `Register` transactions, needed to recognize vote-bearing transfers and
/// to meter invocation gas in the right unit.
pub fn persist(
    store: &Arc<dyn Store>,
    block: &Block,
    prev_system_fee: Fixed8,
    header_chain_len: u32,
    governing_token: Hash256,
    engine: &dyn ScriptEngine,
) -> Result<PersistOutcome, FatalError> {
    let snapshot = Arc::new(Snapshot::new(store.clone()));
    let block_hash = block.hash();

    let (system_fee, application_results) = apply_block(&snapshot, block, prev_system_fee, governing_token, engine)
        .map_err(fatal)?;

    let extends_header_chain = block.index() == header_chain_len;
    update_heads(&snapshot, block, extends_header_chain).map_err(fatal)?;

    snapshot
        .commit()
        .map_err(|e| FatalError::CommitFailed(e.to_string()))?;

    Ok(PersistOutcome {
        block_hash,
        system_fee,
        extends_header_chain,
        application_results,
    })
}

fn fatal(e: StateError) -> FatalError {
    match e {
        StateError::Backend(msg) => FatalError::CommitFailed(msg),
        other => FatalError::InvariantViolated(other.to_string()),
    }
}

fn apply_block(
    snapshot: &Arc<Snapshot>,
    block: &Block,
    prev_system_fee: Fixed8,
    governing_token: Hash256,
    engine: &dyn ScriptEngine,
) -> Result<(Fixed8, Vec<ApplicationExecutionResult>), StateError> {
    let blocks: TypedCache<BlockRecord> = TypedCache::new(snapshot.as_ref(), Column::Blocks);
    let system_fee = block
        .transactions
        .iter()
        .fold(prev_system_fee, |acc, tx| acc + tx.system_fee);
    blocks.add(
        block_hash_key(block).as_ref(),
        &BlockRecord {
            system_fee,
            trimmed: block.trim(),
        },
    )?;

    let mut application_results = Vec::new();
    for tx in &block.transactions {
        if let Some(result) = apply_transaction(snapshot, block.index(), tx, governing_token, engine)? {
            application_results.push(result);
        }
    }

    Ok((system_fee, application_results))
}

fn block_hash_key(block: &Block) -> Hash256 {
    block.hash()
}

#[allow(clippy::too_many_lines)]
fn apply_transaction(
    snapshot: &Arc<Snapshot>,
    block_index: u32,
    tx: &Transaction,
    governing_token: Hash256,
    engine: &dyn ScriptEngine,
) -> Result<Option<ApplicationExecutionResult>, StateError> {
    let transactions: TypedCache<TransactionRecord> = TypedCache::new(snapshot.as_ref(), Column::Transactions);
    let unspent_coins: TypedCache<UnspentCoinState> = TypedCache::new(snapshot.as_ref(), Column::UnspentCoins);
    let spent_coins: TypedCache<SpentCoinState> = TypedCache::new(snapshot.as_ref(), Column::SpentCoins);
    let accounts: TypedCache<AccountState> = TypedCache::new(snapshot.as_ref(), Column::Accounts);
    let validators: TypedCache<ValidatorState> = TypedCache::new(snapshot.as_ref(), Column::Validators);
    let counts: TypedCache<ValidatorsCountState> = TypedCache::new(snapshot.as_ref(), Column::ValidatorsCount);
    let assets: TypedCache<AssetState> = TypedCache::new(snapshot.as_ref(), Column::Assets);
    let contracts: TypedCache<ContractState> = TypedCache::new(snapshot.as_ref(), Column::Contracts);

    let tx_hash = tx.hash();

    // 2a
    transactions.add(
        tx_hash.as_ref(),
        &TransactionRecord {
            block_index,
            transaction: tx.clone(),
        },
    )?;

    // 2b
    unspent_coins.add(tx_hash.as_ref(), &coins::new_unspent(tx.outputs.len()))?;

    // 2c: credit outputs
    for output in &tx.outputs {
        credit_output(&accounts, &validators, &counts, governing_token, output)?;
    }

    // 2d: debit inputs, grouped by prev_hash for spent-coin bookkeeping
    for input in &tx.inputs {
        debit_input(
            &transactions,
            &unspent_coins,
            &spent_coins,
            &accounts,
            &validators,
            &counts,
            governing_token,
            input,
            block_index,
        )?;
    }

    // 2e: dispatch on transaction kind
    let mut application_result = None;
    match &tx.kind {
        TransactionKind::Miner { .. } => {}
        TransactionKind::Register {
            name,
            amount,
            precision,
            owner,
            admin,
        } => {
            assets.add(
                tx_hash.as_ref(),
                &AssetState {
                    asset_id: tx_hash,
                    name: name.clone(),
                    amount: *amount,
                    available: Fixed8::ZERO,
                    precision: *precision,
                    owner: *owner,
                    admin: *admin,
                    expiration: block_index + 2 * ledger_types::constants::DECREMENT_INTERVAL,
                    is_frozen: false,
                },
            )?;
        }
        TransactionKind::Issue => {
            for output in &tx.outputs {
                assets.get_and_change(output.asset_id.as_ref(), |asset| {
                    asset.available += output.value;
                })?;
            }
        }
        TransactionKind::Claim { claims } => {
            for claim in claims {
                if let Some(mut state) = spent_coins.try_get(claim.prev_hash.as_ref())? {
                    state.items.retain(|(index, _)| *index != claim.prev_index);
                    if state.items.is_empty() {
                        spent_coins.delete(claim.prev_hash.as_ref())?;
                    } else {
                        spent_coins.put(claim.prev_hash.as_ref(), &state)?;
                    }
                }
            }
        }
        TransactionKind::Enrollment { pubkey } => {
            if validators.try_get(&pubkey.0)?.is_some() {
                validators.get_and_change(&pubkey.0, |v| v.registered = true)?;
            } else {
                validators.add(
                    &pubkey.0,
                    &ValidatorState {
                        pubkey: *pubkey,
                        registered: true,
                        votes: Fixed8::ZERO,
                    },
                )?;
            }
        }
        TransactionKind::State { descriptors } => {
            for descriptor in descriptors {
                apply_state_descriptor(&accounts, &validators, &counts, governing_token, descriptor)?;
            }
        }
        TransactionKind::Publish { script, properties, name } => {
            let script_hash = ledger_crypto::hash::script_hash(script);
            contracts.get_or_add(
                script_hash.as_ref(),
                || ContractState {
                    script: script.clone(),
                    properties: *properties,
                    name: name.clone(),
                },
            )?;
        }
        TransactionKind::Invocation { gas, .. } => {
            let sandbox = Arc::new(snapshot.child());
            let outcome = engine.execute(sandbox, tx, *gas);
            tracing::debug!(%tx_hash, gas_consumed = ?outcome.gas_consumed, state = ?outcome.state, "persist: invocation executed");
            application_result = Some(ApplicationExecutionResult { tx_hash, outcome });
        }
        TransactionKind::Contract => {}
    }

    Ok(application_result)
}

#[allow(clippy::too_many_arguments)]
fn credit_output(
    accounts: &TypedCache<AccountState>,
    validators: &TypedCache<ValidatorState>,
    counts: &TypedCache<ValidatorsCountState>,
    governing_token: Hash256,
    output: &TransactionOutput,
) -> Result<(), StateError> {
    let key = output.script_hash.as_ref();
    let mut account = accounts.try_get(key)?.unwrap_or_default();
    balances::adjust_balance(&mut account, output.asset_id, output.value)?;

    if output.asset_id == governing_token && !account.votes.is_empty() {
        for pubkey in account.votes.clone() {
            credit_validator(validators, &pubkey, output.value)?;
        }
        let bucket = account.votes.len() - 1;
        mutate_counts(counts, |state| {
            if bucket >= state.votes.len() {
                state.votes.resize(bucket + 1, Fixed8::ZERO);
            }
            if let Some(slot) = state.votes.get_mut(bucket) {
                *slot += output.value;
            }
        })?;
    }

    accounts.put(key, &account)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn debit_input(
    transactions: &TypedCache<TransactionRecord>,
    unspent_coins: &TypedCache<UnspentCoinState>,
    spent_coins: &TypedCache<SpentCoinState>,
    accounts: &TypedCache<AccountState>,
    validators: &TypedCache<ValidatorState>,
    counts: &TypedCache<ValidatorsCountState>,
    governing_token: Hash256,
    input: &ledger_types::transaction::CoinReference,
    spent_height: u32,
) -> Result<(), StateError> {
    let prev_record = transactions.get(input.prev_hash.as_ref())?;
    let prev_output = prev_record
        .transaction
        .outputs
        .get(input.prev_index as usize)
        .cloned()
        .ok_or_else(|| StateError::InvariantViolated("spend of nonexistent output".into()))?;

    let mut unspent = unspent_coins.get(input.prev_hash.as_ref())?;
    coins::mark_spent(&mut unspent, input.prev_index)?;
    if unspent.is_fully_spent() {
        unspent_coins.delete(input.prev_hash.as_ref())?;
    } else {
        unspent_coins.put(input.prev_hash.as_ref(), &unspent)?;
    }

    let key = prev_output.script_hash.as_ref();
    let mut account = accounts.get(key)?;
    balances::adjust_balance(&mut account, prev_output.asset_id, -prev_output.value)?;

    if prev_output.asset_id == governing_token {
        let existing = spent_coins.try_get(input.prev_hash.as_ref())?;
        let updated = coins::record_spent(existing, prev_record.block_index, input.prev_index, spent_height);
        spent_coins.put(input.prev_hash.as_ref(), &updated)?;

        if !account.votes.is_empty() {
            for pubkey in account.votes.clone() {
                debit_validator(validators, &pubkey, prev_output.value)?;
            }
            let bucket = account.votes.len() - 1;
            mutate_counts(counts, |state| {
                if let Some(slot) = state.votes.get_mut(bucket) {
                    *slot -= prev_output.value;
                }
            })?;
        }
    }

    accounts.put(key, &account)?;
    Ok(())
}

fn credit_validator(validators: &TypedCache<ValidatorState>, pubkey: &PubKey, amount: Fixed8) -> Result<(), StateError> {
    if validators.try_get(&pubkey.0)?.is_some() {
        validators.get_and_change(&pubkey.0, |v| v.votes += amount)?;
    } else {
        validators.add(
            &pubkey.0,
            &ValidatorState {
                pubkey: *pubkey,
                registered: false,
                votes: amount,
            },
        )?;
    }
    Ok(())
}

fn debit_validator(validators: &TypedCache<ValidatorState>, pubkey: &PubKey, amount: Fixed8) -> Result<(), StateError> {
    let mut validator = validators.get(&pubkey.0)?;
    validator.votes -= amount;
    if !validator.registered && validator.votes.is_zero() {
        validators.delete(&pubkey.0)?;
    } else {
        validators.put(&pubkey.0, &validator)?;
    }
    Ok(())
}

/// Applies one `State` descriptor: a vote reassignment or a validator
/// registration toggle (spec.md §4.5 "Vote reassignment algorithm").
fn apply_state_descriptor(
    accounts: &TypedCache<AccountState>,
    validators: &TypedCache<ValidatorState>,
    counts: &TypedCache<ValidatorsCountState>,
    governing_token: Hash256,
    descriptor: &StateDescriptor,
) -> Result<(), StateError> {
    match descriptor {
        StateDescriptor::Account { account: account_hash, votes: new_votes } => {
            let key = account_hash.as_ref();
            let mut account = accounts.try_get(key)?.unwrap_or_default();
            let balance = account.balances.get(&governing_token).copied().unwrap_or(Fixed8::ZERO);
            let mut deduped = new_votes.clone();
            deduped.sort_by_key(|pk| pk.0);
            deduped.dedup();

            let delta = votes::recompute(&account.votes, balance, &deduped, balance);
            for (pubkey, amount) in &delta.validator_deltas {
                if *amount >= Fixed8::ZERO {
                    credit_validator(validators, pubkey, *amount)?;
                } else {
                    debit_validator(validators, pubkey, -*amount)?;
                }
            }
            mutate_counts(counts, |state| votes::apply_count_deltas(state, &delta))?;

            account.votes = deduped;
            accounts.put(key, &account)?;
        }
        StateDescriptor::Validator { pubkey, registered } => {
            if validators.try_get(&pubkey.0)?.is_some() {
                let updated = validators.get_and_change(&pubkey.0, |v| v.registered = *registered)?;
                if !updated.registered && updated.votes.is_zero() {
                    validators.delete(&pubkey.0)?;
                }
            } else if *registered {
                validators.add(
                    &pubkey.0,
                    &ValidatorState {
                        pubkey: *pubkey,
                        registered: true,
                        votes: Fixed8::ZERO,
                    },
                )?;
            }
        }
    }
    Ok(())
}

/// Reads the `ValidatorsCountState` singleton (seeding a zeroed default if
/// it has never been written), applies `f`, and writes it back. The
/// singleton never has a pre-existing-key guarantee, unlike every other
/// cache here, since the first vote in a fresh ledger has nothing to
/// `get_and_change`.
fn mutate_counts(
    counts: &TypedCache<ValidatorsCountState>,
    f: impl FnOnce(&mut ValidatorsCountState),
) -> Result<(), StateError> {
    let mut state = counts.try_get(&[])?.unwrap_or_default();
    f(&mut state);
    counts.put(&[], &state)
}

fn update_heads(snapshot: &Arc<Snapshot>, block: &Block, extends_header_chain: bool) -> Result<(), StateError> {
    let block_head: TypedCache<HashIndexState> = TypedCache::new(snapshot.as_ref(), Column::BlockHead);
    block_head.put(
        &[],
        &HashIndexState {
            hash: block.hash(),
            index: block.index(),
        },
    )?;
    if extends_header_chain {
        let header_head: TypedCache<HashIndexState> = TypedCache::new(snapshot.as_ref(), Column::HeaderHead);
        header_head.put(
            &[],
            &HashIndexState {
                hash: block.hash(),
                index: block.index(),
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::build_genesis_block;
    use crate::vm::NullEngine;
    use ledger_crypto::sign::KeyPair;
    use ledger_storage::redb_store::RedbStore;
    use ledger_types::transaction::CoinReference;

    fn store() -> Arc<dyn Store> {
        Arc::new(RedbStore::open_in_memory().expect("open in-memory store"))
    }

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

    fn block_with(header: BlockHeader, transactions: Vec<Transaction>) -> Block {
        Block { header, transactions }
    }

    #[test]
    fn persisting_genesis_credits_the_issuance_address() {
        let store = store();
        let vs = validators(4);
        let genesis = build_genesis_block(&vs).expect("genesis");
        let governing_token = crate::genesis::governing_token_id(&genesis);

        let outcome = persist(&store, &genesis, Fixed8::ZERO, 0, governing_token, &NullEngine)
            .expect("persist genesis");
        assert_eq!(outcome.block_hash, genesis.hash());
        assert!(outcome.application_results.is_empty());

        let accounts: TypedCache<AccountState> = TypedCache::new(store.as_ref(), Column::Accounts);
        let issue = &genesis.transactions[3];
        let recipient = issue.outputs[0].script_hash;
        let account = accounts.get(recipient.0.as_ref()).expect("issuance account exists");
        assert_eq!(account.balances[&governing_token], Fixed8::from_whole(100_000_000));
    }

    #[test]
    fn a_plain_transfer_debits_the_sender_and_credits_the_recipient() {
        let store = store();
        let vs = validators(4);
        let genesis = build_genesis_block(&vs).expect("genesis");
        let governing_token = crate::genesis::governing_token_id(&genesis);
        persist(&store, &genesis, Fixed8::ZERO, 0, governing_token, &NullEngine).expect("persist genesis");

        let issue = &genesis.transactions[3];
        let issue_hash = issue.hash();
        let sender_script = issue.outputs[0].script_hash;
        let recipient_script = Hash160([9u8; 20]);

        let transfer = Transaction {
            inputs: vec![CoinReference {
                prev_hash: issue_hash,
                prev_index: 0,
            }],
            outputs: vec![TransactionOutput {
                asset_id: governing_token,
                value: Fixed8::from_whole(40_000_000),
                script_hash: recipient_script,
            }],
            attributes: vec![],
            witnesses: vec![],
            network_fee: Fixed8::ZERO,
            system_fee: Fixed8::ZERO,
            kind: TransactionKind::Contract,
        };

        let header = BlockHeader {
            prev_hash: genesis.hash(),
            merkle_root: ledger_types::block::merkle_root(&[transfer.hash()]),
            timestamp: genesis.header.timestamp + 1,
            index: 1,
            consensus_data: 0,
            next_consensus: genesis.header.next_consensus,
            witness: Witness::default(),
        };
        let block = block_with(header, vec![transfer]);

        persist(&store, &block, Fixed8::ZERO, 1, governing_token, &NullEngine).expect("persist transfer");

        let accounts: TypedCache<AccountState> = TypedCache::new(store.as_ref(), Column::Accounts);
        let sender = accounts.get(sender_script.0.as_ref()).expect("sender account");
        assert_eq!(sender.balances[&governing_token], Fixed8::from_whole(60_000_000));
        let recipient = accounts.get(recipient_script.0.as_ref()).expect("recipient account");
        assert_eq!(recipient.balances[&governing_token], Fixed8::from_whole(40_000_000));

        let unspent: TypedCache<UnspentCoinState> = TypedCache::new(store.as_ref(), Column::UnspentCoins);
        assert!(unspent.try_get(issue_hash.as_ref()).expect("lookup").is_none());
    }

    #[test]
    fn enrollment_then_state_vote_moves_weight_onto_the_validator() {
        let store = store();
        let vs = validators(4);
        let genesis = build_genesis_block(&vs).expect("genesis");
        let governing_token = crate::genesis::governing_token_id(&genesis);
        persist(&store, &genesis, Fixed8::ZERO, 0, governing_token, &NullEngine).expect("persist genesis");

        let issue = &genesis.transactions[3];
        let voter_script = issue.outputs[0].script_hash;
        let candidate = KeyPair::generate().public_key();

        let enroll = Transaction {
            inputs: vec![],
            outputs: vec![],
            attributes: vec![],
            witnesses: vec![],
            network_fee: Fixed8::ZERO,
            system_fee: Fixed8::ZERO,
            kind: TransactionKind::Enrollment { pubkey: candidate },
        };
        let vote = Transaction {
            inputs: vec![],
            outputs: vec![],
            attributes: vec![],
            witnesses: vec![],
            network_fee: Fixed8::ZERO,
            system_fee: Fixed8::ZERO,
            kind: TransactionKind::State {
                descriptors: vec![StateDescriptor::Account {
                    account: voter_script,
                    votes: vec![candidate],
                }],
            },
        };

        let header = BlockHeader {
            prev_hash: genesis.hash(),
            merkle_root: ledger_types::block::merkle_root(&[enroll.hash(), vote.hash()]),
            timestamp: genesis.header.timestamp + 1,
            index: 1,
            consensus_data: 0,
            next_consensus: genesis.header.next_consensus,
            witness: Witness::default(),
        };
        let block = block_with(header, vec![enroll, vote]);

        persist(&store, &block, Fixed8::ZERO, 1, governing_token, &NullEngine).expect("persist votes");

        let validators_cache: TypedCache<ValidatorState> = TypedCache::new(store.as_ref(), Column::Validators);
        let state = validators_cache.get(&candidate.0).expect("validator registered");
        assert_eq!(state.votes, Fixed8::from_whole(100_000_000));

        let counts: TypedCache<ValidatorsCountState> = TypedCache::new(store.as_ref(), Column::ValidatorsCount);
        let counts_state = counts.get(&[]).expect("counts singleton exists");
        assert_eq!(counts_state.votes[0], Fixed8::from_whole(100_000_000));
    }

    #[test]
    fn invocation_results_flow_back_through_persist_outcome() {
        let store = store();
        let vs = validators(4);
        let genesis = build_genesis_block(&vs).expect("genesis");
        let governing_token = crate::genesis::governing_token_id(&genesis);
        persist(&store, &genesis, Fixed8::ZERO, 0, governing_token, &NullEngine).expect("persist genesis");

        let invoke = Transaction {
            inputs: vec![],
            outputs: vec![],
            attributes: vec![],
            witnesses: vec![],
            network_fee: Fixed8::ZERO,
            system_fee: Fixed8::from_whole(1),
            kind: TransactionKind::Invocation {
                script: vec![0xAA],
                gas: Fixed8::from_whole(1),
            },
        };
        let header = BlockHeader {
            prev_hash: genesis.hash(),
            merkle_root: ledger_types::block::merkle_root(&[invoke.hash()]),
            timestamp: genesis.header.timestamp + 1,
            index: 1,
            consensus_data: 0,
            next_consensus: genesis.header.next_consensus,
            witness: Witness::default(),
        };
        let block = block_with(header, vec![invoke.clone()]);

        let outcome = persist(&store, &block, Fixed8::ZERO, 1, governing_token, &NullEngine).expect("persist invoke");
        assert_eq!(outcome.application_results.len(), 1);
        assert_eq!(outcome.application_results[0].tx_hash, invoke.hash());
        assert_eq!(outcome.application_results[0].outcome.state, crate::vm::VmState::Halt);
    }
}
