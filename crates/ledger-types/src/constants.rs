//! Protocol-wide constants.

use crate::fixed8::Fixed8;

/// Target seconds between consecutive blocks.
pub const SECONDS_PER_BLOCK: u64 = 15;

/// Number of blocks between halvings of the per-block utility-token
/// generation amount.
pub const DECREMENT_INTERVAL: u32 = 2_000_000;

/// Upper bound on the number of active validators the community may vote
/// into existence.
pub const MAX_VALIDATORS: u32 = 1024;

/// Per-block utility-token generation amount for each `DECREMENT_INTERVAL`
/// era; the last entry repeats forever once the schedule is exhausted.
pub const GENERATION_AMOUNT: [u32; 22] = [
    8, 7, 6, 5, 4, 3, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
];

/// Maximum number of pending transactions the mempool may hold at once
/// (spec.md §4.4).
pub const MEMPOOL_MAX: usize = 50_000;

/// Number of blocks after which a spent governing-token output can no
/// longer be referenced by a `Claim` transaction. Not present in the
/// distilled spec's mempool/persist description but part of a complete
/// claim-validation path; bounds how far back `persist` must be able to
/// look up `SpentCoinState` history.
pub const MAX_TRACEABLE_BLOCKS: u32 = 2_102_400;

/// Computes the utility-token amount generated by including one block at
/// `height`, per the halving schedule in [`GENERATION_AMOUNT`].
pub fn generation_amount_at(height: u32) -> Fixed8 {
    let era = (height / DECREMENT_INTERVAL) as usize;
    let amount = GENERATION_AMOUNT
        .get(era)
        .copied()
        .unwrap_or(*GENERATION_AMOUNT.last().unwrap_or(&1));
    Fixed8::from_whole(amount as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_amount_follows_the_halving_schedule() {
        assert_eq!(generation_amount_at(0), Fixed8::from_whole(8));
        assert_eq!(
            generation_amount_at(DECREMENT_INTERVAL),
            Fixed8::from_whole(7)
        );
    }

    #[test]
    fn generation_amount_floors_at_last_entry_past_schedule_end() {
        let far_future = DECREMENT_INTERVAL * 100;
        assert_eq!(generation_amount_at(far_future), Fixed8::from_whole(1));
    }
}
