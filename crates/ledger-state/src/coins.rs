//! Unspent/spent coin bookkeeping (spec.md §3 `UnspentCoinState`,
//! `SpentCoinState`).

use ledger_types::entities::{SpentCoinState, UnspentCoinState};
use ledger_types::error::StateError;

/// Builds the initial unspent-coin record for a transaction with
/// `output_count` outputs: every output starts unspent.
pub fn new_unspent(output_count: usize) -> UnspentCoinState {
    UnspentCoinState {
        items: vec![true; output_count],
    }
}

/// Marks output `index` as spent. Fails if the index is out of range or
/// already spent — either indicates a transaction referenced a coin that
/// does not exist or was double-spent, which `persist` must reject rather
/// than silently tolerate (spec.md §7).
pub fn mark_spent(state: &mut UnspentCoinState, index: u16) -> Result<(), StateError> {
    let slot = state
        .items
        .get_mut(index as usize)
        .ok_or(StateError::InvariantViolated("spend of nonexistent output index".into()))?;
    if !*slot {
        return Err(StateError::InvariantViolated("double-spend of output".into()));
    }
    *slot = false;
    Ok(())
}

/// Records that output `index` of a transaction included at
/// `transaction_height` was spent at `spent_height`, appending to (or
/// seeding) the transaction's `SpentCoinState` so a later `Claim` can
/// compute the generated utility-token amount.
pub fn record_spent(
    state: Option<SpentCoinState>,
    transaction_height: u32,
    index: u16,
    spent_height: u32,
) -> SpentCoinState {
    let mut state = state.unwrap_or(SpentCoinState {
        transaction_height,
        items: Vec::new(),
    });
    state.items.push((index, spent_height));
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spending_twice_is_rejected() {
        let mut state = new_unspent(2);
        mark_spent(&mut state, 0).expect("first spend succeeds");
        assert!(mark_spent(&mut state, 0).is_err());
    }

    #[test]
    fn spending_out_of_range_index_is_rejected() {
        let mut state = new_unspent(1);
        assert!(mark_spent(&mut state, 5).is_err());
    }

    #[test]
    fn record_spent_appends_to_existing_history() {
        let first = record_spent(None, 10, 0, 20);
        let second = record_spent(Some(first), 10, 1, 25);
        assert_eq!(second.items, vec![(0, 20), (1, 25)]);
    }
}
