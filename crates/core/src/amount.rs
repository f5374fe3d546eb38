//! Fixed-point token amounts
//!
//! Both ledger assets use unsigned fixed-point arithmetic with 18 fractional
//! digits, stored as u128 base units. All arithmetic is checked; basis-point
//! multiplication is split so it is exact and cannot overflow for any input.

use std::fmt;
use std::iter::Sum;

use serde::{Deserialize, Serialize};

/// Number of fractional digits
pub const DECIMALS: u32 = 18;

/// Base units per whole token
pub const ONE: u128 = 10u128.pow(DECIMALS);

/// Basis points in 100%
pub const BPS_DENOMINATOR: u128 = 10_000;

/// An unsigned fixed-point token amount in base units
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Amount(pub u128);

impl Amount {
    /// The zero amount
    pub const ZERO: Amount = Amount(0);

    /// Create an amount from raw base units
    pub fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// Create an amount from a whole number of tokens
    pub fn from_whole(tokens: u64) -> Self {
        Self(tokens as u128 * ONE)
    }

    /// Raw base units
    pub fn base_units(&self) -> u128 {
        self.0
    }

    /// Whether this amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Saturating addition
    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction (floors at zero)
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Multiply by a basis-point fraction, rounding down
    ///
    /// Split into quotient and remainder so the intermediate product never
    /// exceeds u128 for bps <= 10000: a*b/D == (a/D)*b + (a%D)*b/D.
    pub fn mul_bps(self, bps: u16) -> Amount {
        debug_assert!(bps as u128 <= BPS_DENOMINATOR);
        let q = self.0 / BPS_DENOMINATOR;
        let r = self.0 % BPS_DENOMINATOR;
        Amount(q * bps as u128 + r * bps as u128 / BPS_DENOMINATOR)
    }

    /// Multiply by an integer count, saturating on overflow
    pub fn saturating_mul_count(self, count: u64) -> Amount {
        Amount(self.0.saturating_mul(count as u128))
    }

    /// The smaller of two amounts
    pub fn min(self, other: Amount) -> Amount {
        Amount(self.0.min(other.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc.saturating_add(a))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ONE;
        let frac = self.0 % ONE;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            let s = format!("{:018}", frac);
            write!(f, "{}.{}", whole, s.trim_end_matches('0'))
        }
    }
}
