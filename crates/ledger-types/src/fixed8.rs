//! `Fixed8`: a signed 64-bit fixed-point number with 10^-8 precision, used
//! for every asset balance and amount in the ledger.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// 10^-8 precision signed fixed-point value (mirrors the protocol's native
/// money representation).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default, Debug, Encode, Decode,
)]
pub struct Fixed8(pub i64);

/// The number of decimal places represented by `Fixed8`.
pub const DECIMALS: u32 = 8;
/// `10^DECIMALS`, the scale factor between a whole unit and one `Fixed8` tick.
pub const SCALE: i64 = 100_000_000;

impl Fixed8 {
    /// The additive identity.
    pub const ZERO: Fixed8 = Fixed8(0);

    /// Builds a `Fixed8` from a whole-unit integer amount.
    pub const fn from_whole(units: i64) -> Self {
        Fixed8(units * SCALE)
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, rhs: Fixed8) -> Option<Fixed8> {
        self.0.checked_add(rhs.0).map(Fixed8)
    }

    /// Checked subtraction; `None` on overflow.
    pub fn checked_sub(self, rhs: Fixed8) -> Option<Fixed8> {
        self.0.checked_sub(rhs.0).map(Fixed8)
    }

    /// True if this value is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// True if this value is strictly negative.
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Fixed8 {
    type Output = Fixed8;
    fn add(self, rhs: Fixed8) -> Fixed8 {
        Fixed8(self.0 + rhs.0)
    }
}

impl AddAssign for Fixed8 {
    fn add_assign(&mut self, rhs: Fixed8) {
        self.0 += rhs.0;
    }
}

impl Sub for Fixed8 {
    type Output = Fixed8;
    fn sub(self, rhs: Fixed8) -> Fixed8 {
        Fixed8(self.0 - rhs.0)
    }
}

impl SubAssign for Fixed8 {
    fn sub_assign(&mut self, rhs: Fixed8) {
        self.0 -= rhs.0;
    }
}

impl Neg for Fixed8 {
    type Output = Fixed8;
    fn neg(self) -> Fixed8 {
        Fixed8(-self.0)
    }
}

impl Sum for Fixed8 {
    fn sum<I: Iterator<Item = Fixed8>>(iter: I) -> Self {
        iter.fold(Fixed8::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_units_scale_correctly() {
        assert_eq!(Fixed8::from_whole(100_000_000).0, 100_000_000 * SCALE);
    }

    #[test]
    fn addition_and_negation_round_trip() {
        let a = Fixed8::from_whole(10);
        let b = Fixed8::from_whole(3);
        assert_eq!((a - b).0, Fixed8::from_whole(7).0);
        assert_eq!(-a + a, Fixed8::ZERO);
    }

    proptest::proptest! {
        /// `checked_add` then `checked_sub` of the same operand returns the
        /// original value whenever neither step overflows — `Fixed8` never
        /// silently wraps the way raw `i64` arithmetic would.
        #[test]
        fn checked_add_then_checked_sub_round_trips(a in i64::MIN / 4..i64::MAX / 4, b in i64::MIN / 4..i64::MAX / 4) {
            let (a, b) = (Fixed8(a), Fixed8(b));
            if let Some(sum) = a.checked_add(b) {
                prop_assert_eq!(sum.checked_sub(b), Some(a));
            }
        }

        /// Negation is its own inverse and preserves magnitude.
        #[test]
        fn double_negation_is_identity(v in i64::MIN / 2..i64::MAX / 2) {
            let v = Fixed8(v);
            prop_assert_eq!(-(-v), v);
        }
    }
}
