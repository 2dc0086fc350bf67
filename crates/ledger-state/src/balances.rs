//! Balance adjustment over an `AccountState`'s per-asset map.

use ledger_types::entities::AccountState;
use ledger_types::error::StateError;
use ledger_types::{Fixed8, Hash256};

/// Adds `delta` (which may be negative) to `account`'s balance of
/// `asset`, pruning the entry if it nets to zero. Fails if the adjustment
/// would drive the balance negative or overflow — either is a persist
/// invariant violation, since validation must already have proven the
/// account can afford the debit.
pub fn adjust_balance(
    account: &mut AccountState,
    asset: Hash256,
    delta: Fixed8,
) -> Result<(), StateError> {
    let current = account.balances.get(&asset).copied().unwrap_or(Fixed8::ZERO);
    let next = current
        .checked_add(delta)
        .ok_or_else(|| StateError::InvariantViolated("balance overflow".into()))?;
    if next.is_negative() {
        return Err(StateError::InvariantViolated(format!(
            "balance of asset {asset} would go negative"
        )));
    }
    if next.is_zero() {
        account.balances.remove(&asset);
    } else {
        account.balances.insert(asset, next);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crediting_a_fresh_asset_inserts_it() {
        let mut account = AccountState::default();
        let asset = Hash256([1; 32]);
        adjust_balance(&mut account, asset, Fixed8::from_whole(5)).expect("credit");
        assert_eq!(account.balances[&asset], Fixed8::from_whole(5));
    }

    #[test]
    fn debiting_to_zero_prunes_the_entry() {
        let mut account = AccountState::default();
        let asset = Hash256([1; 32]);
        adjust_balance(&mut account, asset, Fixed8::from_whole(5)).expect("credit");
        adjust_balance(&mut account, asset, Fixed8::from_whole(-5)).expect("debit");
        assert!(!account.balances.contains_key(&asset));
    }

    #[test]
    fn overdraft_is_rejected() {
        let mut account = AccountState::default();
        let asset = Hash256([1; 32]);
        assert!(adjust_balance(&mut account, asset, Fixed8::from_whole(-1)).is_err());
    }

    proptest::proptest! {
        /// Crediting then debiting the same amount always returns the
        /// account to its starting balance (spec.md §8: "`a.balances[x] ==
        /// sum of unspent outputs to a.script_hash with asset=x`" only
        /// holds if credits and debits net out exactly).
        #[test]
        fn credit_then_debit_same_amount_is_a_no_op(whole in 1i64..1_000_000) {
            let mut account = AccountState::default();
            let asset = Hash256([3; 32]);
            let amount = Fixed8::from_whole(whole);
            adjust_balance(&mut account, asset, amount).expect("credit");
            adjust_balance(&mut account, asset, -amount).expect("debit");
            prop_assert!(!account.balances.contains_key(&asset));
        }
    }
}
