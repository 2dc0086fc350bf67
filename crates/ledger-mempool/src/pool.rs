//! The concurrent, bounded, fee-prioritized transaction pool (spec.md §4.4).
//!
//! `contains`/`try_add`/`try_remove` are backed by `DashMap`, which stripes
//! its internal locking across shards so the ingestion dispatcher's writes
//! and concurrent RPC/validator reads rarely contend on the same shard
//! (spec.md §5: "the lone exception" to the otherwise single-threaded
//! ledger). Eviction's sort is pure data over a cheap-to-clone key and is
//! parallelized with `rayon`, per the design note in spec.md §9.

use crate::key::EvictionKey;
use dashmap::DashMap;
use ledger_types::constants::MEMPOOL_MAX;
use ledger_types::error::MempoolError;
use ledger_types::prelude::Transaction;
use ledger_types::Hash256;
use rayon::prelude::*;

/// Outcome of [`Mempool::try_add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The transaction was inserted and remains in the pool.
    Added,
    /// The transaction was already present; no change was made.
    AlreadyExists,
    /// The pool was at capacity and, after eviction, the newly inserted
    /// transaction itself was among the lowest-priority entries removed
    /// (spec.md §4.4 "Failure mode").
    OutOfMemory,
}

/// A bounded, concurrent, fee-density-ordered transaction pool.
pub struct Mempool {
    entries: DashMap<Hash256, Transaction>,
    capacity: usize,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new(MEMPOOL_MAX)
    }
}

impl Mempool {
    /// Builds an empty pool with room for `capacity` transactions.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// Wait-free membership check.
    pub fn contains(&self, hash: &Hash256) -> bool {
        self.entries.contains_key(hash)
    }

    /// Current number of pooled transactions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the pool holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `tx` (keyed by `hash`) if not already present, then enforces
    /// capacity by evicting the lowest-priority entries (spec.md §4.4).
    ///
    /// Returns [`AddOutcome::AlreadyExists`] without touching the pool if
    /// `hash` is already present, [`AddOutcome::OutOfMemory`] if `tx` itself
    /// was evicted to bring the pool back under capacity, and
    /// [`AddOutcome::Added`] otherwise.
    pub fn try_add(&self, hash: Hash256, tx: Transaction) -> Result<AddOutcome, MempoolError> {
        if self.entries.contains_key(&hash) {
            return Ok(AddOutcome::AlreadyExists);
        }
        self.entries.insert(hash, tx);
        let survived = self.enforce_capacity();
        if survived.contains(&hash) {
            tracing::debug!(%hash, size = self.entries.len(), "mempool: admitted transaction");
            Ok(AddOutcome::Added)
        } else {
            tracing::warn!(%hash, "mempool: newly admitted transaction evicted for capacity");
            Ok(AddOutcome::OutOfMemory)
        }
    }

    /// Removes `hash` if present, returning the removed transaction.
    pub fn try_remove(&self, hash: &Hash256) -> Option<Transaction> {
        self.entries.remove(hash).map(|(_, tx)| tx)
    }

    /// A point-in-time snapshot of every pooled `(hash, transaction)` pair.
    /// Consistent across the call but may miss concurrent writes made after
    /// it returns (spec.md §4.4 "`iter()`").
    pub fn snapshot(&self) -> Vec<(Hash256, Transaction)> {
        self.entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// The same pooled transactions ordered **descending** by priority
    /// (highest fee density first), for re-submission after a block persist
    /// (spec.md §4.4 "Reinsertion on block persist").
    pub fn drain_by_descending_priority(&self) -> Vec<(Hash256, Transaction)> {
        let mut keyed = self.keyed_snapshot();
        keyed.par_sort_unstable_by(|a, b| b.0.cmp(&a.0));
        keyed.into_iter().map(|(_, hash, tx)| (hash, tx)).collect()
    }

    /// Removes every entry above `self.capacity`, lowest priority first,
    /// returning the hashes that survived. Pure aside from the `DashMap`
    /// mutation, so the expensive sort is done over a cheap `Vec` snapshot
    /// rather than while holding any shard lock.
    fn enforce_capacity(&self) -> std::collections::HashSet<Hash256> {
        let mut keyed = self.keyed_snapshot();
        if keyed.len() <= self.capacity {
            return keyed.into_iter().map(|(_, hash, _)| hash).collect();
        }
        keyed.par_sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let evict_count = keyed.len() - self.capacity;
        for (_, hash, _) in keyed.iter().take(evict_count) {
            self.entries.remove(hash);
        }
        keyed
            .into_iter()
            .skip(evict_count)
            .map(|(_, hash, _)| hash)
            .collect()
    }

    fn keyed_snapshot(&self) -> Vec<(EvictionKey, Hash256, Transaction)> {
        self.entries
            .iter()
            .map(|entry| {
                let hash = *entry.key();
                let tx = entry.value().clone();
                (EvictionKey::of(&tx, hash), hash, tx)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_types::prelude::TransactionKind;
    use ledger_types::Fixed8;

    fn tx(network_fee: i64, padding: usize) -> Transaction {
        Transaction {
            inputs: vec![],
            outputs: vec![],
            attributes: vec![vec![0u8; padding]]
                .into_iter()
                .map(|data| ledger_types::transaction::TransactionAttribute { usage: 0, data })
                .collect(),
            witnesses: vec![],
            network_fee: Fixed8(network_fee),
            system_fee: Fixed8::ZERO,
            kind: TransactionKind::Contract,
        }
    }

    #[test]
    fn try_add_rejects_duplicates() {
        let pool = Mempool::new(10);
        let t = tx(100, 0);
        let hash = t.hash();
        assert_eq!(pool.try_add(hash, t.clone()).unwrap(), AddOutcome::Added);
        assert_eq!(pool.try_add(hash, t).unwrap(), AddOutcome::AlreadyExists);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn try_remove_drops_the_entry() {
        let pool = Mempool::new(10);
        let t = tx(100, 0);
        let hash = t.hash();
        pool.try_add(hash, t).unwrap();
        assert!(pool.try_remove(&hash).is_some());
        assert!(!pool.contains(&hash));
    }

    #[test]
    fn capacity_overflow_evicts_lowest_density_entry() {
        let pool = Mempool::new(2);
        let low = tx(1, 200);
        let mid = tx(50, 100);
        let high = tx(1000, 10);
        let low_hash = low.hash();
        pool.try_add(low_hash, low).unwrap();
        pool.try_add(mid.hash(), mid).unwrap();
        pool.try_add(high.hash(), high).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&low_hash));
    }

    #[test]
    fn inserting_the_lowest_priority_transaction_reports_out_of_memory() {
        let pool = Mempool::new(1);
        let resident = tx(1000, 1);
        pool.try_add(resident.hash(), resident).unwrap();
        let newcomer = tx(1, 1000);
        let newcomer_hash = newcomer.hash();
        let outcome = pool.try_add(newcomer_hash, newcomer).unwrap();
        assert_eq!(outcome, AddOutcome::OutOfMemory);
        assert!(!pool.contains(&newcomer_hash));
    }

    #[test]
    fn descending_priority_orders_highest_density_first() {
        let pool = Mempool::new(10);
        let low = tx(1, 100);
        let high = tx(100, 100);
        pool.try_add(low.hash(), low.clone()).unwrap();
        pool.try_add(high.hash(), high.clone()).unwrap();
        let ordered = pool.drain_by_descending_priority();
        assert_eq!(ordered[0].0, high.hash());
        assert_eq!(ordered[1].0, low.hash());
    }

    proptest::proptest! {
        /// spec.md §8: "`|mempool| <= MEMPOOL_MAX` after every `OnNewTransaction`."
        #[test]
        fn pool_never_exceeds_capacity(fees in proptest::collection::vec(1i64..1_000_000, 1..200)) {
            let pool = Mempool::new(16);
            for (i, fee) in fees.into_iter().enumerate() {
                let mut t = tx(fee, i % 64);
                // Vary the hash by padding `attributes` differently per index so
                // distinct transactions never collide.
                t.attributes.push(ledger_types::transaction::TransactionAttribute {
                    usage: 1,
                    data: (i as u32).to_be_bytes().to_vec(),
                });
                pool.try_add(t.hash(), t).unwrap();
                proptest::prop_assert!(pool.len() <= 16);
            }
        }
    }
}
