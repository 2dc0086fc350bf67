//! The eviction/reinsertion priority key (spec.md §4.4).
//!
//! Transactions are ordered ascending by the triple `(fee_density,
//! network_fee, hash)`; the lowest-priority entries are evicted first when
//! the pool is over capacity, and the same triple reversed drives the
//! descending re-submission order after a block persists.

use ledger_types::prelude::Transaction;
use ledger_types::Hash256;

/// A transaction's position in the mempool's priority order.
///
/// `fee_density` is kept as a cross-multiplied rational (`network_fee *
/// other.size` vs `other.network_fee * size`) rather than a lossy `f64`, so
/// two transactions of equal density never tie-break incorrectly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvictionKey {
    /// `network_fee`, numerator of the fee-density ratio.
    pub network_fee: i64,
    /// Serialized size in bytes, denominator of the fee-density ratio.
    pub size: usize,
    /// The transaction's content hash, the final tie-breaker.
    pub hash: Hash256,
}

impl EvictionKey {
    /// Builds the key for `tx`.
    pub fn of(tx: &Transaction, hash: Hash256) -> Self {
        let (network_fee, size) = tx.fee_density();
        Self {
            network_fee,
            size,
            hash,
        }
    }

    /// Cross-multiplied comparison of `self.fee_density` against `other`'s,
    /// avoiding floating point. Both `size` values are `usize` (always
    /// positive), so the product fits in `i128` without overflow for any
    /// realistic transaction size.
    fn density_cmp(&self, other: &Self) -> std::cmp::Ordering {
        let lhs = self.network_fee as i128 * other.size as i128;
        let rhs = other.network_fee as i128 * self.size as i128;
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for EvictionKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EvictionKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.density_cmp(other)
            .then_with(|| self.network_fee.cmp(&other.network_fee))
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(network_fee: i64, size: usize, hash_byte: u8) -> EvictionKey {
        EvictionKey {
            network_fee,
            size,
            hash: Hash256([hash_byte; 32]),
        }
    }

    #[test]
    fn lower_fee_density_sorts_first() {
        let low = key(1, 100, 0);
        let high = key(10, 100, 0);
        assert!(low < high);
    }

    #[test]
    fn equal_density_breaks_tie_on_absolute_fee() {
        // 1/100 == 2/200, so the tie falls through to network_fee.
        let a = key(1, 100, 0);
        let b = key(2, 200, 0);
        assert!(a < b);
    }

    #[test]
    fn equal_density_and_fee_breaks_tie_on_hash() {
        let a = key(5, 100, 1);
        let b = key(5, 100, 2);
        assert!(a < b);
    }
}
