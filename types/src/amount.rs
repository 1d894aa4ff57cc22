//! Coin amounts in base units.
//!
//! Amounts are fixed-point integers. One whole coin is [`Amount::COIN`] base units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);
    /// Base units per whole coin.
    pub const COIN: u64 = 1_000_000;

    pub const fn new(base_units: u64) -> Self {
        Self(base_units)
    }

    /// Convert a whole-coin quantity to base units. `None` on overflow.
    pub fn from_whole(whole: u64) -> Option<Self> {
        whole.checked_mul(Self::COIN).map(Self)
    }

    pub fn base_units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Total of `amounts`, `None` on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Self>) -> Option<Self> {
        amounts.into_iter().try_fold(Self::ZERO, Self::checked_add)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_units_convert_to_base_units() {
        assert_eq!(Amount::from_whole(2000).unwrap().base_units(), 2_000_000_000);
        assert_eq!(Amount::from_whole(u64::MAX), None);
    }

    #[test]
    fn checked_sum_reports_overflow() {
        let small = [1, 2, 3].into_iter().map(Amount::new);
        assert_eq!(Amount::checked_sum(small), Some(Amount::new(6)));
        let huge = [u64::MAX, 1].into_iter().map(Amount::new);
        assert_eq!(Amount::checked_sum(huge), None);
        assert_eq!(Amount::checked_sum([]), Some(Amount::ZERO));
    }
}
