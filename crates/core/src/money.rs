//! Fixed-point money amounts (2 fractional digits).

use core::iter::Sum;
use core::ops::Add;
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// A currency amount with exactly two fractional digits.
///
/// Backed by `rust_decimal::Decimal`, never binary floating point. Every
/// constructor rounds half-up (midpoint away from zero) to the cent, so two
/// amounts that print the same are always equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    /// Number of fractional digits kept for every amount.
    pub const SCALE: u32 = 2;

    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, Self::SCALE));

    /// Round an arbitrary decimal to the cent.
    pub fn new(amount: Decimal) -> Self {
        let mut rounded = amount.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(Self::SCALE);
        Self(rounded)
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, Self::SCALE))
    }

    /// Whole currency units (e.g. `Money::from_units(15)` is 15.00).
    pub fn from_units(units: i64) -> Self {
        Self::new(Decimal::from(units))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Exact product with a quantity (no rounding needed: scale stays at 2).
    pub fn times(self, quantity: u32) -> Money {
        Money::new(self.0 * Decimal::from(quantity))
    }

    /// Multiply by a rate (e.g. a tax rate) and round half-up to the cent.
    pub fn apply_rate(self, rate: Decimal) -> Money {
        Money::new(self.0 * rate)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::new(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid money amount '{s}': {e}")))?;
        Ok(Money::new(amount))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up_to_the_cent() {
        assert_eq!(Money::new(Decimal::new(1005, 3)).to_string(), "1.01");
        assert_eq!(Money::new(Decimal::new(1004, 3)).to_string(), "1.00");
        assert_eq!(Money::new(Decimal::new(-1005, 3)).to_string(), "-1.01");
    }

    #[test]
    fn equal_amounts_print_identically() {
        let a: Money = "10".parse().unwrap();
        let b = Money::from_cents(1000);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "10.00");
        assert_eq!(b.to_string(), "10.00");
    }

    #[test]
    fn times_and_sum_are_exact() {
        let total: Money = [Money::from_cents(1000).times(2), Money::from_cents(8500)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(10_500));
    }

    #[test]
    fn apply_rate_rounds() {
        // 105.00 * 0.08 = 8.40
        assert_eq!(Money::from_cents(10_500).apply_rate(Decimal::new(8, 2)), Money::from_cents(840));
        // 0.07 * 0.08 = 0.0056 -> 0.01
        assert_eq!(Money::from_cents(7).apply_rate(Decimal::new(8, 2)), Money::from_cents(1));
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(11_340)).unwrap();
        assert_eq!(json, "\"113.40\"");
    }

    #[test]
    fn zero_keeps_two_digits() {
        assert_eq!(serde_json::to_string(&Money::ZERO).unwrap(), "\"0.00\"");
    }

    #[test]
    fn deserializing_rounds_to_the_cent() {
        let m: Money = serde_json::from_str("\"10\"").unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"10.00\"");
    }

    #[test]
    fn rejects_garbage() {
        assert!("ten dollars".parse::<Money>().is_err());
    }
}
