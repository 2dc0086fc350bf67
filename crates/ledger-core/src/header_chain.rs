//! The header chain manager (spec.md §4.3 "C3").
//!
//! Holds the full, in-memory `header_index`: every canonical header hash
//! known so far, by height from 0. A prefix of length `stored_header_count`
//! (always a multiple of [`HEADER_HASH_BATCH_SIZE`]) has been flushed to the
//! store as `HeaderHashList` batches; the remaining suffix exists only in
//! memory until the next flush.

use ledger_storage::{Column, Store};
use ledger_types::entities::{HashIndexState, TrimmedBlock, HEADER_HASH_BATCH_SIZE};
use ledger_types::error::StateError;
use ledger_types::prelude::HeaderHashList;
use ledger_types::Hash256;

/// The in-memory, startup-recovered header chain.
pub struct HeaderChain {
    header_index: Vec<Hash256>,
    stored_header_count: usize,
}

impl HeaderChain {
    /// Loads the header chain from `store` (spec.md §4.3 "On startup").
    ///
    /// 1. Every persisted `HeaderHashList` batch is concatenated in key
    ///    (height) order; `stored_header_count` becomes their total length.
    /// 2. If no batches exist yet (a partially persisted ledger that never
    ///    reached the first 2000-header flush), the whole chain is rebuilt
    ///    from the `Blocks` cache ordered by height.
    /// 3. Otherwise, if `HeaderHead` is ahead of the persisted prefix, the
    ///    in-memory suffix is extended by walking `TrimmedBlock.prev_hash`
    ///    backward from the header tip down to `stored_header_count`.
    pub fn load(store: &dyn Store) -> Result<Self, StateError> {
        let mut batches = store
            .scan_prefix(Column::HeaderHashList, &[])
            .map_err(|e| StateError::Backend(e.to_string()))?;
        batches.sort_by(|a, b| a.0.cmp(&b.0));

        let mut header_index = Vec::new();
        for (_, raw) in batches {
            let batch: HeaderHashList = ledger_types::codec::decode(&raw)?;
            header_index.extend(batch.hashes);
        }
        let stored_header_count = header_index.len();

        if header_index.is_empty() {
            header_index = Self::recover_from_blocks(store)?;
        } else if let Some(head) = Self::read_head(store, Column::HeaderHead)? {
            if head.index as usize >= header_index.len() {
                let mut suffix = Self::walk_back_to(store, head.hash, header_index.len())?;
                header_index.append(&mut suffix);
            }
        }

        Ok(Self {
            header_index,
            stored_header_count,
        })
    }

    /// Rebuilds the full header index from whatever `TrimmedBlock`s exist in
    /// the `Blocks` cache, ordered by height (spec.md §4.3 step 2, "recovery
    /// path for partially persisted ledgers").
    fn recover_from_blocks(store: &dyn Store) -> Result<Vec<Hash256>, StateError> {
        let raw_blocks = store
            .scan_prefix(Column::Blocks, &[])
            .map_err(|e| StateError::Backend(e.to_string()))?;
        let mut by_height = Vec::with_capacity(raw_blocks.len());
        for (_, bytes) in raw_blocks {
            let record: ledger_types::entities::BlockRecord = ledger_types::codec::decode(&bytes)?;
            by_height.push((record.trimmed.header.index, record.trimmed.hash()));
        }
        by_height.sort_by_key(|(index, _)| *index);
        Ok(by_height.into_iter().map(|(_, hash)| hash).collect())
    }

    /// Walks `TrimmedBlock.prev_hash` backward from `tip`, collecting hashes
    /// down to (but not including) height `stop_at_height`, returned in
    /// ascending height order.
    fn walk_back_to(store: &dyn Store, tip: Hash256, stop_at_height: usize) -> Result<Vec<Hash256>, StateError> {
        let mut hash = tip;
        let mut collected = Vec::new();
        loop {
            let trimmed = match Self::lookup_trimmed(store, hash)? {
                Some(t) => t,
                None => break,
            };
            if (trimmed.header.index as usize) < stop_at_height {
                break;
            }
            collected.push(hash);
            if trimmed.header.index == 0 {
                break;
            }
            hash = trimmed.header.prev_hash;
        }
        collected.reverse();
        Ok(collected)
    }

    /// An empty chain, for genesis construction before anything has been
    /// persisted.
    pub fn empty() -> Self {
        Self {
            header_index: Vec::new(),
            stored_header_count: 0,
        }
    }

    fn read_head(store: &dyn Store, column: Column) -> Result<Option<HashIndexState>, StateError> {
        let raw = store
            .get_raw(column, &[])
            .map_err(|e| StateError::Backend(e.to_string()))?;
        raw.map(|bytes| ledger_types::codec::decode(&bytes)).transpose()
    }

    fn lookup_trimmed(store: &dyn Store, hash: Hash256) -> Result<Option<TrimmedBlock>, StateError> {
        let raw = store
            .get_raw(Column::Blocks, hash.as_ref())
            .map_err(|e| StateError::Backend(e.to_string()))?;
        raw.map(|bytes| {
            let record: ledger_types::entities::BlockRecord = ledger_types::codec::decode(&bytes)?;
            Ok(record.trimmed)
        })
        .transpose()
    }

    /// Number of known header hashes (persisted prefix plus in-memory
    /// suffix).
    pub fn len(&self) -> u32 {
        self.header_index.len() as u32
    }

    /// True if no headers are known yet (a brand-new chain).
    pub fn is_empty(&self) -> bool {
        self.header_index.is_empty()
    }

    /// The hash at `index`, if known.
    pub fn get(&self, index: u32) -> Option<Hash256> {
        self.header_index.get(index as usize).copied()
    }

    /// The highest known height, if any header is known.
    pub fn tip_index(&self) -> Option<u32> {
        self.len().checked_sub(1)
    }

    /// Appends `hash` as the header at height `self.len()`. Callers must
    /// have already validated linkage and witness before calling this
    /// (spec.md §4.3 "only permitted after validating header linkage and
    /// witness at height == len").
    pub fn append(&mut self, hash: Hash256) -> u32 {
        self.header_index.push(hash);
        self.len() - 1
    }

    /// Flushes any complete 2000-hash batches beyond `stored_header_count`
    /// to `store` as `HeaderHashList` entries (spec.md §4.3
    /// "`save_to_store`").
    pub fn save_to_store(&mut self, store: &dyn Store) -> Result<(), StateError> {
        while self.header_index.len() - self.stored_header_count >= HEADER_HASH_BATCH_SIZE {
            let start = self.stored_header_count;
            let end = start + HEADER_HASH_BATCH_SIZE;
            let batch = HeaderHashList {
                hashes: self.header_index[start..end].to_vec(),
            };
            let key = (start as u32).to_be_bytes();
            let encoded = ledger_types::codec::encode(&batch);
            store
                .put_raw(Column::HeaderHashList, &key, &encoded)
                .map_err(|e| StateError::Backend(e.to_string()))?;
            self.stored_header_count = end;
        }
        Ok(())
    }

    /// Number of header hashes already flushed to the store.
    pub fn stored_header_count(&self) -> usize {
        self.stored_header_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_storage::redb_store::RedbStore;

    #[test]
    fn append_grows_the_in_memory_suffix() {
        let mut chain = HeaderChain::empty();
        let h0 = Hash256([1; 32]);
        assert_eq!(chain.append(h0), 0);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.get(0), Some(h0));
        assert_eq!(chain.tip_index(), Some(0));
    }

    #[test]
    fn save_to_store_flushes_full_batches_only() {
        let store = RedbStore::open_in_memory().expect("open store");
        let mut chain = HeaderChain::empty();
        for i in 0..HEADER_HASH_BATCH_SIZE + 10 {
            chain.append(Hash256([(i % 251) as u8; 32]));
        }
        chain.save_to_store(&store).expect("flush");
        assert_eq!(chain.stored_header_count(), HEADER_HASH_BATCH_SIZE);

        let batches = store.scan_prefix(Column::HeaderHashList, &[]).expect("scan");
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn loading_an_empty_store_yields_an_empty_chain() {
        let store = RedbStore::open_in_memory().expect("open store");
        let chain = HeaderChain::load(&store).expect("load");
        assert!(chain.is_empty());
    }

    proptest::proptest! {
        /// `header_index` stays contiguous and gap-free no matter how many
        /// hashes are appended and flushed in between (spec.md §8:
        /// "`header_index` is contiguous, gap-free, ... `header_index[0]
        /// == genesis.hash`").
        #[test]
        fn appending_and_flushing_keeps_the_chain_contiguous(count in 1usize..4_500) {
            let store = RedbStore::open_in_memory().expect("open store");
            let mut chain = HeaderChain::empty();
            let genesis = Hash256([0xAB; 32]);
            chain.append(genesis);
            for i in 1..count {
                chain.append(Hash256([(i % 251) as u8; 32]));
                if i % 700 == 0 {
                    chain.save_to_store(&store).expect("flush");
                }
            }
            prop_assert_eq!(chain.len(), count as u32);
            prop_assert_eq!(chain.get(0), Some(genesis));
            for i in 0..chain.len() {
                prop_assert!(chain.get(i).is_some());
            }
        }
    }
}
