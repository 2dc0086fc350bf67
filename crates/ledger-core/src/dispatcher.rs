//! The ingestion dispatcher (spec.md §4.6 "C6") and the `Blockchain` facade
//! spec.md §0 names it as: the header chain manager (C3), the persist engine
//! (C5), and a single-threaded serialized message loop wired together.
//!
//! [`Blockchain`] owns every non-mempool mutable field spec.md §5 lists as
//! single-threaded: `header_index`, `block_cache`, `block_cache_unverified`,
//! `subscribers`, `stored_header_count` (inside [`crate::header_chain::HeaderChain`]),
//! and the current block/header heads. [`BlockchainHandle`] is the cloneable
//! front door other tasks hold; every call crosses a `tokio::sync::mpsc`
//! channel so only `Blockchain::run`'s task ever touches that state, matching
//! the "single ledger actor per process" discipline via explicit construction
//! rather than a global singleton lock (spec.md §9 design note).
//!
//! Mailbox priority (spec.md §4.6 "Mailbox priority"): `Header[]`, `Block`,
//! `ConsensusPayload`, and `Terminated` are high priority; `Transaction` and
//! `Register` are normal. Two `mpsc` queues plus a `biased` `tokio::select!`
//! give the high queue strict preemption over the normal one.

use crate::genesis;
use crate::header_chain::HeaderChain;
use crate::persist::{self, ApplicationExecutionResult, PersistOutcome};
use crate::validate;
use crate::vm::ScriptEngine;
use ledger_mempool::{AddOutcome, Mempool};
use ledger_storage::typed_cache::TypedCache;
use ledger_storage::{Column, Snapshot, Store};
use ledger_types::error::FatalError;
use ledger_types::prelude::*;
use lru::LruCache;
use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// The number of recent consensus payloads kept for re-broadcast (spec.md
/// §4.6 "`RelayCache`").
const RELAY_CACHE_CAPACITY: usize = 100;

/// Outcome reported to an inventory's submitter (spec.md §4.6, §7).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RelayResultReason {
    /// Accepted.
    Succeed,
    /// Already known (in the mempool, the cache, or persisted storage).
    AlreadyExists,
    /// The mempool was at capacity and the submission was itself evicted.
    OutOfMemory,
    /// The item's predecessor (header or block) is not yet known; it has
    /// been buffered pending it.
    UnableToVerify,
    /// Failed structural or witness validation.
    Invalid,
    /// Rejected for referencing state outside the traceable window (spec
    /// supplement: `Claim` references older than `MAX_TRACEABLE_BLOCKS`).
    Expired,
    /// A policy plugin rejected the submission.
    PolicyFail,
    /// An outcome not covered by the above (internal channel failure).
    Unknown,
}

/// A consensus engine payload (spec.md §1 Non-goals: the consensus engine
/// itself is out of scope; the ledger only verifies the witness and relays).
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct ConsensusPayload {
    /// Index of the submitting validator within the current validator set.
    pub validator_index: u16,
    /// Height this payload concerns.
    pub height: u32,
    /// Consensus-engine view number; opaque to the ledger.
    pub view_number: u8,
    /// Opaque consensus-engine payload bytes.
    pub data: Vec<u8>,
    /// The multi-sig witness proving a current validator signed this
    /// payload.
    pub witness: Witness,
}

impl ConsensusPayload {
    /// The payload's content hash (excludes the witness, as for headers and
    /// transactions).
    pub fn hash(&self) -> Hash256 {
        let mut unsigned = self.clone();
        unsigned.witness = Witness::default();
        ledger_types::codec::double_sha256(&ledger_types::codec::encode(&unsigned))
    }
}

/// A message broadcast to every registered subscriber (spec.md §6
/// "Outbound messages: to subscribers").
#[derive(Clone, Debug)]
pub enum Notification {
    /// A block finished persisting.
    PersistCompleted {
        /// The persisted block's hash.
        block_hash: Hash256,
        /// The persisted block's height.
        height: u32,
    },
    /// An `Invocation` transaction's VM results, reported regardless of
    /// success (spec.md §4.5.1).
    ApplicationExecuted(ApplicationExecutionResult),
}

/// Outbound collaborators the dispatcher talks to (spec.md §6): `LocalNode`
/// for relay, `TaskManager` for header-sync bookkeeping, and an optional
/// consensus sink. Modeled as a trait seam since all three are out of scope
/// collaborators (spec.md §1).
pub trait OutboundSink: Send + Sync {
    /// `RelayDirectly{inventory}` to `LocalNode`.
    fn relay_directly(&self, _inventory_hash: Hash256) {}
    /// `HeaderTaskCompleted` to `TaskManager`.
    fn header_task_completed(&self) {}
    /// Forwards a verified consensus payload to the consensus engine.
    fn consensus_payload(&self, _payload: ConsensusPayload) {}
}

/// An `OutboundSink` that drops every outbound message; used where no real
/// networking/consensus collaborator is wired in (tests, a ledger-only
/// deployment).
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl OutboundSink for NullSink {}

/// The pluggable policy check run before mempool admission (spec.md §4.6
/// "run plugin policy check").
pub trait PolicyEngine: Send + Sync {
    /// Returns `Err` with a human-readable reason if `tx` is rejected by
    /// policy.
    fn check(&self, tx: &Transaction) -> Result<(), String>;
}

/// A policy engine that accepts every transaction; the default when no
/// plugin is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAllPolicy;

impl PolicyEngine for AllowAllPolicy {
    fn check(&self, _tx: &Transaction) -> Result<(), String> {
        Ok(())
    }
}

/// Construction parameters for a [`Blockchain`] (spec.md §6 "Genesis" plus
/// the ambient `LedgerConfig` surface).
#[derive(Clone)]
pub struct BlockchainConfig {
    /// The standby validator set genesis derives `next_consensus` from.
    pub standby_validators: Vec<PubKey>,
    /// Maximum number of pooled mempool transactions (spec.md §4.4).
    pub mempool_capacity: usize,
    /// Blocks within this many heights of the chain tip are relayed
    /// directly rather than only cached (spec.md §4.6 "within 100 blocks of
    /// chain tip").
    pub relay_window: u32,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            standby_validators: Vec::new(),
            mempool_capacity: ledger_types::constants::MEMPOOL_MAX,
            relay_window: 100,
        }
    }
}

enum Inbound {
    Register {
        sender: mpsc::UnboundedSender<Notification>,
        reply: oneshot::Sender<u64>,
    },
    Terminated {
        id: u64,
    },
    Import {
        blocks: Vec<Block>,
        reply: oneshot::Sender<u32>,
    },
    Headers {
        headers: Vec<BlockHeader>,
    },
    Block {
        block: Block,
        reply: Option<oneshot::Sender<RelayResultReason>>,
    },
    Transaction {
        tx: Transaction,
        reply: Option<oneshot::Sender<RelayResultReason>>,
    },
    Consensus {
        payload: ConsensusPayload,
        reply: Option<oneshot::Sender<RelayResultReason>>,
    },
}

/// A cloneable front door onto a running [`Blockchain`] actor. Every method
/// enqueues a message and (where the protocol expects a reply) awaits it;
/// the actor task itself is the only thing that ever mutates ledger state.
#[derive(Clone)]
pub struct BlockchainHandle {
    high_tx: mpsc::UnboundedSender<Inbound>,
    normal_tx: mpsc::UnboundedSender<Inbound>,
    mempool: Arc<Mempool>,
    store: Arc<dyn Store>,
}

impl BlockchainHandle {
    /// Submits a single block (spec.md §6 `Block`).
    pub async fn submit_block(&self, block: Block) -> RelayResultReason {
        let (reply, rx) = oneshot::channel();
        if self
            .high_tx
            .send(Inbound::Block { block, reply: Some(reply) })
            .is_err()
        {
            return RelayResultReason::Unknown;
        }
        rx.await.unwrap_or(RelayResultReason::Unknown)
    }

    /// Submits a batch of headers (spec.md §6 `Header[]`); no reply is
    /// defined beyond the `HeaderTaskCompleted` side effect.
    pub fn submit_headers(&self, headers: Vec<BlockHeader>) {
        let _ = self.high_tx.send(Inbound::Headers { headers });
    }

    /// Submits a transaction (spec.md §6 `Transaction`).
    pub async fn submit_transaction(&self, tx: Transaction) -> RelayResultReason {
        let (reply, rx) = oneshot::channel();
        if self
            .normal_tx
            .send(Inbound::Transaction { tx, reply: Some(reply) })
            .is_err()
        {
            return RelayResultReason::Unknown;
        }
        rx.await.unwrap_or(RelayResultReason::Unknown)
    }

    /// Submits a consensus payload (spec.md §6 `ConsensusPayload`).
    pub async fn submit_consensus(&self, payload: ConsensusPayload) -> RelayResultReason {
        let (reply, rx) = oneshot::channel();
        if self
            .high_tx
            .send(Inbound::Consensus { payload, reply: Some(reply) })
            .is_err()
        {
            return RelayResultReason::Unknown;
        }
        rx.await.unwrap_or(RelayResultReason::Unknown)
    }

    /// Bulk-applies `blocks`, each of which must be exactly `height + 1`
    /// (spec.md §6 `Import{blocks}`). Returns the count actually imported
    /// before the first rejection (`ImportCompleted`'s payload).
    pub async fn import(&self, blocks: Vec<Block>) -> u32 {
        let (reply, rx) = oneshot::channel();
        if self.high_tx.send(Inbound::Import { blocks, reply }).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Registers a new subscriber, returning its id (for later
    /// [`Self::terminate`]) and the channel it will receive
    /// [`Notification`]s on (spec.md §4.6 "Subscribers").
    pub async fn register(&self) -> (u64, mpsc::UnboundedReceiver<Notification>) {
        let (sender, rx) = mpsc::unbounded_channel();
        let (reply, id_rx) = oneshot::channel();
        if self.high_tx.send(Inbound::Register { sender, reply }).is_err() {
            return (0, rx);
        }
        (id_rx.await.unwrap_or(0), rx)
    }

    /// Unregisters a subscriber previously returned by [`Self::register`].
    pub fn terminate(&self, id: u64) {
        let _ = self.high_tx.send(Inbound::Terminated { id });
    }

    /// The mempool, for read-only consumers (RPC queries, a validator
    /// examining pending transactions) — spec.md §5's lone concurrent
    /// exception.
    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    /// True if `hash` names a persisted block (spec.md §4.1
    /// `contains_block`).
    pub fn contains_block(&self, hash: Hash256) -> bool {
        let blocks: TypedCache<BlockRecord> = TypedCache::new(self.store.as_ref(), Column::Blocks);
        blocks.try_get(hash.as_ref()).ok().flatten().is_some()
    }

    /// True if `hash` names a persisted transaction (spec.md §4.1
    /// `contains_tx`).
    pub fn contains_tx(&self, hash: Hash256) -> bool {
        let txs: TypedCache<TransactionRecord> = TypedCache::new(self.store.as_ref(), Column::Transactions);
        txs.try_get(hash.as_ref()).ok().flatten().is_some()
    }

    /// True if `hash` is recorded as conflicting with an already-persisted
    /// transaction. Conflict-record tracking itself is out of scope (spec
    /// supplement, `SPEC_FULL.md` §2); this always returns `false`, but the
    /// query surface spec.md §4.1 names is present for callers that expect
    /// it.
    pub fn contains_conflict(&self, _hash: Hash256) -> bool {
        false
    }
}

/// The header chain manager, persist engine, and ingestion dispatcher,
/// wired into a single actor owning every non-mempool mutable field (spec.md
/// §5).
pub struct Blockchain {
    store: Arc<dyn Store>,
    engine: Arc<dyn ScriptEngine>,
    mempool: Arc<Mempool>,
    outbound: Arc<dyn OutboundSink>,
    policy: Arc<dyn PolicyEngine>,

    header_chain: HeaderChain,
    block_cache: BTreeMap<u32, Block>,
    block_cache_unverified: BTreeMap<u32, Block>,
    relay_cache: LruCache<Hash256, ConsensusPayload>,
    subscribers: Vec<(u64, mpsc::UnboundedSender<Notification>)>,
    next_subscriber_id: u64,

    height: u32,
    system_fee: Fixed8,
    governing_token: Hash256,
    utility_token: Hash256,
    relay_window: u32,

    high_rx: mpsc::UnboundedReceiver<Inbound>,
    normal_rx: mpsc::UnboundedReceiver<Inbound>,
}

impl Blockchain {
    /// Opens (or cold-starts) the ledger over `store`: loads the header
    /// chain (spec.md §4.3 "On startup"), and, if the chain is empty,
    /// deterministically constructs and persists the genesis block (spec.md
    /// §4.3 step 4, §6). Returns the actor plus the handle other tasks use
    /// to talk to it; the caller is responsible for `tokio::spawn`ing
    /// [`Blockchain::run`].
    pub fn new(
        store: Arc<dyn Store>,
        config: BlockchainConfig,
        engine: Arc<dyn ScriptEngine>,
        outbound: Arc<dyn OutboundSink>,
        policy: Arc<dyn PolicyEngine>,
    ) -> Result<(Self, BlockchainHandle), FatalError> {
        let mut header_chain = HeaderChain::load(store.as_ref()).map_err(to_fatal)?;
        let mempool = Arc::new(Mempool::new(config.mempool_capacity));

        let genesis = genesis::build_genesis_block(&config.standby_validators)
            .map_err(|e| FatalError::InvariantViolated(e.to_string()))?;
        let governing_token = genesis::governing_token_id(&genesis);
        let utility_token = genesis::utility_token_id(&genesis);

        let mut height = 0u32;
        let mut system_fee = Fixed8::ZERO;

        if header_chain.is_empty() {
            let outcome = persist::persist(&store, &genesis, Fixed8::ZERO, 0, governing_token, engine.as_ref())
                .map_err(to_fatal)?;
            header_chain.append(outcome.block_hash);
            system_fee = outcome.system_fee;
            height = 0;
        } else {
            let block_head: TypedCache<HashIndexState> = TypedCache::new(store.as_ref(), Column::BlockHead);
            if let Some(head) = block_head.try_get(&[]).map_err(|e| FatalError::InvariantViolated(e.to_string()))? {
                height = head.index;
                let blocks: TypedCache<BlockRecord> = TypedCache::new(store.as_ref(), Column::Blocks);
                if let Some(record) = blocks
                    .try_get(head.hash.as_ref())
                    .map_err(|e| FatalError::InvariantViolated(e.to_string()))?
                {
                    system_fee = record.system_fee;
                }
            }
        }

        let (high_tx, high_rx) = mpsc::unbounded_channel();
        let (normal_tx, normal_rx) = mpsc::unbounded_channel();
        let handle = BlockchainHandle {
            high_tx,
            normal_tx,
            mempool: mempool.clone(),
            store: store.clone(),
        };

        let actor = Self {
            store,
            engine,
            mempool,
            outbound,
            policy,
            header_chain,
            block_cache: BTreeMap::new(),
            block_cache_unverified: BTreeMap::new(),
            relay_cache: LruCache::new(NonZeroUsize::new(RELAY_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)),
            subscribers: Vec::new(),
            next_subscriber_id: 0,
            height,
            system_fee,
            governing_token,
            utility_token,
            relay_window: config.relay_window,
            high_rx,
            normal_rx,
        };

        Ok((actor, handle))
    }

    /// Runs the serialized message loop until every sender side of the
    /// handle has been dropped. High-priority messages (`Header[]`,
    /// `Block`, `ConsensusPayload`, `Terminated`) strictly preempt normal
    /// ones (`Transaction`, `Register`) — spec.md §4.6 "Mailbox priority".
    /// `currentSnapshot` (here, just `self.store`) is dropped along with
    /// `self` when this future completes, matching spec.md §5 "Shutdown
    /// disposes `currentSnapshot` in `PostStop`".
    pub async fn run(mut self) {
        loop {
            let msg = tokio::select! {
                biased;
                msg = self.high_rx.recv() => msg,
                msg = self.normal_rx.recv() => msg,
            };
            match msg {
                Some(msg) => self.handle(msg),
                None => break,
            }
        }
    }

    fn handle(&mut self, msg: Inbound) {
        match msg {
            Inbound::Register { sender, reply } => {
                let id = self.register_subscriber(sender);
                let _ = reply.send(id);
            }
            Inbound::Terminated { id } => self.terminate_subscriber(id),
            Inbound::Import { blocks, reply } => {
                let imported = self.import(blocks);
                let _ = reply.send(imported);
            }
            Inbound::Headers { headers } => self.on_new_headers(headers),
            Inbound::Block { block, reply } => {
                let result = self.on_new_block(block);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Inbound::Transaction { tx, reply } => {
                let result = self.on_new_transaction(tx);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Inbound::Consensus { payload, reply } => {
                let result = self.on_new_consensus(payload);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
        }
    }

    fn register_subscriber(&mut self, sender: mpsc::UnboundedSender<Notification>) -> u64 {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        self.subscribers.push((id, sender));
        id
    }

    fn terminate_subscriber(&mut self, id: u64) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    fn distribute(&mut self, notification: Notification) {
        self.subscribers
            .retain(|(_, sender)| sender.send(notification.clone()).is_ok());
    }

    fn header_at_hash(&self, hash: Hash256) -> Option<BlockHeader> {
        let blocks: TypedCache<BlockRecord> = TypedCache::new(self.store.as_ref(), Column::Blocks);
        blocks.try_get(hash.as_ref()).ok().flatten().map(|r| r.trimmed.header)
    }

    fn tip_header(&self) -> Option<BlockHeader> {
        let index = self.header_chain.tip_index()?;
        let hash = self.header_chain.get(index)?;
        self.header_at_hash(hash)
    }

    /// **`OnNewHeaders`** (spec.md §4.6): extends the header chain with as
    /// many leading, contiguous, verifying headers as possible, stopping at
    /// the first gap or failure. Headers already in the chain are silently
    /// skipped (spec.md §8 "Replaying headers already in `header_index`:
    /// no-op, no error").
    fn on_new_headers(&mut self, headers: Vec<BlockHeader>) {
        if headers.is_empty() {
            return;
        }
        let snapshot = Snapshot::new(self.store.clone());
        let blocks: TypedCache<BlockRecord> = TypedCache::new(&snapshot, Column::Blocks);
        let header_head: TypedCache<HashIndexState> = TypedCache::new(&snapshot, Column::HeaderHead);

        let mut prev_header = self.tip_header();
        let mut appended = false;
        for header in headers {
            let index = header.index;
            if index < self.header_chain.len() {
                continue;
            }
            if index > self.header_chain.len() {
                break;
            }
            if validate::verify_linkage(&header, prev_header.as_ref()).is_err() {
                break;
            }
            if let Some(prev) = &prev_header {
                if validate::verify_header_witness(&header, prev.next_consensus).is_err() {
                    break;
                }
            }

            let hash = header.hash();
            self.header_chain.append(hash);
            appended = true;
            if blocks.try_get(hash.as_ref()).ok().flatten().is_none() {
                let _ = blocks.add(
                    hash.as_ref(),
                    &BlockRecord {
                        system_fee: Fixed8::ZERO,
                        trimmed: TrimmedBlock {
                            header: header.clone(),
                            tx_hashes: Vec::new(),
                        },
                    },
                );
            }
            let _ = header_head.put(&[], &HashIndexState { hash, index });
            prev_header = Some(header);
        }

        if appended {
            let _ = self.header_chain.save_to_store(&snapshot);
            let _ = snapshot.commit();
            self.outbound.header_task_completed();
        }
    }

    /// **`OnNewBlock`** (spec.md §4.6).
    fn on_new_block(&mut self, block: Block) -> RelayResultReason {
        let index = block.index();
        if index <= self.height {
            return RelayResultReason::AlreadyExists;
        }
        if self.block_cache.contains_key(&index) || self.block_cache_unverified.contains_key(&index) {
            return RelayResultReason::AlreadyExists;
        }

        let header_len = self.header_chain.len();
        if index > header_len {
            self.block_cache_unverified.insert(index, block);
            return RelayResultReason::UnableToVerify;
        }
        if index == header_len {
            let prev = self.tip_header();
            let consensus = prev.as_ref().map_or_else(Hash160::default, |h| h.next_consensus);
            if validate::verify_block(&block, prev.as_ref(), consensus).is_err() {
                return RelayResultReason::Invalid;
            }
        } else if self.header_chain.get(index) != Some(block.hash()) {
            return RelayResultReason::Invalid;
        }

        if index == self.height + 1 {
            self.persist_contiguous_chain(block);
        } else {
            let within_window = index.saturating_sub(self.height) <= self.relay_window;
            if within_window {
                self.outbound.relay_directly(block.hash());
            }
            self.block_cache.insert(index, block);
        }
        RelayResultReason::Succeed
    }

    /// Persists `first_block` and every already-cached, immediately
    /// following block, in height order (spec.md §4.6 "persist a chain of
    /// contiguous blocks"). Aborts the process on any fatal persist error
    /// (spec.md §7).
    fn persist_contiguous_chain(&mut self, first_block: Block) {
        let first_index = first_block.index();
        let first_hash = first_block.hash();
        let header_len_before = self.header_chain.len();

        let mut block = first_block;
        loop {
            let index = block.index();
            let header_chain_len = self.header_chain.len();
            let outcome = match persist::persist(
                &self.store,
                &block,
                self.system_fee,
                header_chain_len,
                self.governing_token,
                self.engine.as_ref(),
            ) {
                Ok(outcome) => outcome,
                Err(e) => {
                    use ledger_types::error::ErrorCode;
                    tracing::error!(error = %e, code = e.code(), height = index, "persist: fatal invariant violated, aborting");
                    std::process::abort();
                }
            };

            self.system_fee = outcome.system_fee;
            self.height = index;
            if outcome.extends_header_chain {
                self.header_chain.append(outcome.block_hash);
            }
            tracing::debug!(height = index, hash = %outcome.block_hash, "persist: block committed");
            self.on_persist_completed(&block, &outcome);

            block = match self.block_cache.remove(&(index + 1)) {
                Some(next) => next,
                None => break,
            };
        }

        let _ = self.header_chain.save_to_store(self.store.as_ref());

        let within_window = header_len_before.saturating_sub(first_index) <= self.relay_window;
        if within_window {
            self.outbound.relay_directly(first_hash);
        }

        if let Some(buffered) = self.block_cache_unverified.remove(&(self.height + 1)) {
            let _ = self.on_new_block(buffered);
        }
    }

    fn on_persist_completed(&mut self, block: &Block, outcome: &PersistOutcome) {
        self.block_cache.remove(&block.index());
        for tx in &block.transactions {
            self.mempool.try_remove(&tx.hash());
        }
        self.reinsert_mempool();

        self.distribute(Notification::PersistCompleted {
            block_hash: outcome.block_hash,
            height: block.index(),
        });
        for result in &outcome.application_results {
            self.distribute(Notification::ApplicationExecuted(result.clone()));
        }
    }

    /// Re-validates and re-submits every surviving mempool transaction in
    /// descending priority order (spec.md §4.4 "Reinsertion on block
    /// persist"). Per the Open Question in spec.md §9, the contents are
    /// copied out and the pool entries removed before any re-submission
    /// happens, so a re-submission can never observe its own stale copy
    /// still resident.
    fn reinsert_mempool(&mut self) {
        let ordered = self.mempool.drain_by_descending_priority();
        for (hash, _) in &ordered {
            self.mempool.try_remove(hash);
        }
        for (_, tx) in ordered {
            let _ = self.on_new_transaction(tx);
        }
    }

    /// **`OnNewTransaction`** (spec.md §4.6).
    fn on_new_transaction(&mut self, tx: Transaction) -> RelayResultReason {
        if tx.is_miner() {
            return RelayResultReason::Invalid;
        }
        let hash = tx.hash();
        if self.mempool.contains(&hash) {
            return RelayResultReason::AlreadyExists;
        }
        let txs: TypedCache<TransactionRecord> = TypedCache::new(self.store.as_ref(), Column::Transactions);
        if txs.try_get(hash.as_ref()).ok().flatten().is_some() {
            return RelayResultReason::AlreadyExists;
        }

        if validate::verify_transaction(self.store.as_ref(), &tx, self.utility_token).is_err() {
            return RelayResultReason::Invalid;
        }
        if let TransactionKind::Claim { claims } = &tx.kind {
            if validate::verify_claim_traceability(self.store.as_ref(), claims, self.height).is_err() {
                return RelayResultReason::Expired;
            }
        }
        if let Err(_reason) = self.policy.check(&tx) {
            return RelayResultReason::PolicyFail;
        }

        match self.mempool.try_add(hash, tx) {
            Ok(AddOutcome::Added) => {
                self.outbound.relay_directly(hash);
                RelayResultReason::Succeed
            }
            Ok(AddOutcome::AlreadyExists) => RelayResultReason::AlreadyExists,
            Ok(AddOutcome::OutOfMemory) => RelayResultReason::OutOfMemory,
            Err(_) => RelayResultReason::Unknown,
        }
    }

    /// **`OnNewConsensus`** (spec.md §4.6).
    fn on_new_consensus(&mut self, payload: ConsensusPayload) -> RelayResultReason {
        let consensus_address = self.tip_header().map_or_else(Hash160::default, |h| h.next_consensus);
        let witness_hash = ledger_crypto::hash::script_hash(&payload.witness.verification_script);
        if witness_hash != consensus_address {
            return RelayResultReason::Invalid;
        }
        let message = payload.hash();
        if ledger_crypto::multisig::verify_multisig_witness(
            &payload.witness.verification_script,
            &payload.witness.invocation_script,
            message.as_ref(),
        )
        .is_err()
        {
            return RelayResultReason::Invalid;
        }

        self.outbound.consensus_payload(payload.clone());
        self.relay_cache.put(message, payload);
        self.outbound.relay_directly(message);
        RelayResultReason::Succeed
    }

    /// **`Import{blocks}`** (spec.md §6): applies each block in strict
    /// `height + 1` order, stopping at the first one that does not fit or
    /// fails validation. Returns the count actually imported
    /// (`ImportCompleted`'s payload).
    fn import(&mut self, blocks: Vec<Block>) -> u32 {
        let mut imported = 0u32;
        for block in blocks {
            if block.index() != self.height + 1 {
                break;
            }
            if self.on_new_block(block) != RelayResultReason::Succeed {
                break;
            }
            imported += 1;
        }
        imported
    }
}

fn to_fatal(e: StateError) -> FatalError {
    match e {
        StateError::Backend(msg) => FatalError::CommitFailed(msg),
        other => FatalError::InvariantViolated(other.to_string()),
    }
}
