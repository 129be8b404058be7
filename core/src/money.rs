//! Money amounts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// Money amount in cents (to avoid floating point issues)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a new money amount from cents
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new money amount from whole units (converted to cents)
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    /// Returns the value in cents
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Multiply by a quantity, saturating on overflow.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Apply a rate expressed in basis points (1/100 of a percent), rounding half up.
    ///
    /// `Money::from_units(200).basis_points(1000)` is `20.00`.
    #[must_use]
    pub fn basis_points(self, bps: u32) -> Self {
        let scaled = i128::from(self.0) * i128::from(bps);
        #[allow(clippy::cast_possible_truncation)] // bps ≤ 10_000 keeps the result within i64
        let rounded = ((scaled + 5_000) / 10_000) as i64;
        Self(rounded)
    }

    /// Subtract, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let value = self.0.saturating_sub(other.0);
        if value < 0 { Self(0) } else { Self(value) }
    }

    /// True when the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn display_pads_cents() {
        assert_eq!(Money::from_cents(1205).to_string(), "12.05");
        assert_eq!(Money::from_cents(-50).to_string(), "-0.50");
    }

    #[test]
    fn basis_points_rounds_half_up() {
        assert_eq!(Money::from_units(200).basis_points(1_000), Money::from_units(20));
        // 0.15 * 10% = 0.015 -> 0.02
        assert_eq!(Money::from_cents(15).basis_points(1_000), Money::from_cents(2));
    }

    #[test]
    fn saturating_sub_clamps_at_zero() {
        assert_eq!(Money::from_cents(100).saturating_sub(Money::from_cents(300)), Money::ZERO);
    }

    #[test]
    fn sum_of_lines() {
        let total: Money = [Money::from_cents(100), Money::from_cents(250)].into_iter().sum();
        assert_eq!(total, Money::from_cents(350));
    }
}
