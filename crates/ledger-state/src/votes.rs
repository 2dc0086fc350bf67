//! Vote (re)assignment and validator vote-count bookkeeping.
//!
//! Whenever an account's governing-token balance or vote list changes, the
//! ledger must: withdraw the account's old weight from every validator (and
//! vote-count bucket) it used to support, then apply its new weight to
//! every validator (and bucket) it now supports. This module computes those
//! deltas as pure data; `ledger-core`'s persist engine applies them against
//! the snapshot cache.

use ledger_types::entities::ValidatorsCountState;
use ledger_types::{Fixed8, PubKey};
use std::collections::BTreeMap;

/// The result of recomputing one account's vote weight: per-validator
/// balance deltas, plus the `ValidatorsCountState` bucket delta.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VoteDelta {
    /// Net change in vote weight per validator public key. A key present
    /// with a zero delta is omitted.
    pub validator_deltas: BTreeMap<PubKey, Fixed8>,
    /// `(bucket_index, delta)` pairs for `ValidatorsCountState.votes`.
    /// `bucket_index` is `vote_count - 1` (an account voting for `k`
    /// validators contributes to bucket `k - 1`).
    pub count_deltas: Vec<(usize, Fixed8)>,
}

/// Computes the [`VoteDelta`] for an account whose vote list changes from
/// `(old_votes, old_balance)` to `(new_votes, new_balance)`. Either side
/// may be empty (an account casting its first vote, or withdrawing its
/// last one).
pub fn recompute(
    old_votes: &[PubKey],
    old_balance: Fixed8,
    new_votes: &[PubKey],
    new_balance: Fixed8,
) -> VoteDelta {
    let mut validator_deltas: BTreeMap<PubKey, Fixed8> = BTreeMap::new();
    for &pubkey in old_votes {
        *validator_deltas.entry(pubkey).or_insert(Fixed8::ZERO) -= old_balance;
    }
    for &pubkey in new_votes {
        *validator_deltas.entry(pubkey).or_insert(Fixed8::ZERO) += new_balance;
    }
    validator_deltas.retain(|_, delta| !delta.is_zero());

    let mut count_deltas = Vec::new();
    if !old_votes.is_empty() {
        count_deltas.push((old_votes.len() - 1, -old_balance));
    }
    if !new_votes.is_empty() {
        count_deltas.push((new_votes.len() - 1, new_balance));
    }

    VoteDelta {
        validator_deltas,
        count_deltas,
    }
}

/// Applies a [`VoteDelta`]'s `count_deltas` to `state`, growing the bucket
/// vector if a delta targets an index beyond its current length (an
/// account may vote for up to `MAX_VALIDATORS` candidates).
pub fn apply_count_deltas(state: &mut ValidatorsCountState, delta: &VoteDelta) {
    for &(index, amount) in &delta.count_deltas {
        if index >= state.votes.len() {
            state.votes.resize(index + 1, Fixed8::ZERO);
        }
        if let Some(slot) = state.votes.get_mut(index) {
            *slot += amount;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdrawing_all_votes_zeroes_out_the_validator() {
        let validator = PubKey([1; 33]);
        let delta = recompute(&[validator], Fixed8::from_whole(10), &[], Fixed8::ZERO);
        assert_eq!(delta.validator_deltas[&validator], Fixed8::from_whole(-10));
    }

    #[test]
    fn switching_votes_nets_correctly_for_shared_validator() {
        let a = PubKey([1; 33]);
        let b = PubKey([2; 33]);
        let delta = recompute(&[a, b], Fixed8::from_whole(5), &[a], Fixed8::from_whole(5));
        assert!(!delta.validator_deltas.contains_key(&a));
        assert_eq!(delta.validator_deltas[&b], Fixed8::from_whole(-5));
    }

    #[test]
    fn count_deltas_target_vote_count_minus_one_bucket() {
        let a = PubKey([1; 33]);
        let b = PubKey([2; 33]);
        let delta = recompute(&[], Fixed8::ZERO, &[a, b], Fixed8::from_whole(3));
        assert_eq!(delta.count_deltas, vec![(1, Fixed8::from_whole(3))]);
    }

    #[test]
    fn apply_count_deltas_grows_bucket_vector_as_needed() {
        let mut state = ValidatorsCountState { votes: vec![] };
        let delta = VoteDelta {
            validator_deltas: BTreeMap::new(),
            count_deltas: vec![(3, Fixed8::from_whole(1))],
        };
        apply_count_deltas(&mut state, &delta);
        assert_eq!(state.votes.len(), 4);
        assert_eq!(state.votes[3], Fixed8::from_whole(1));
    }
}
