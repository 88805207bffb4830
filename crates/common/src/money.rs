//! Exact monetary amounts.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A money amount backed by an exact decimal.
///
/// Amounts keep whatever scale they were created with, so multiplying a unit
/// price of `3.50` by `5` yields exactly `17.50`. Rendering always shows at
/// least two fractional digits (`"0.00"`, `"12.30"`) and never rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// Wraps a decimal amount.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Returns zero, rendered as `"0.00"`.
    pub fn zero() -> Self {
        Self(Decimal::new(0, 2))
    }

    /// Returns the underlying decimal.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Adds another amount, returning `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    pub fn checked_multiply(&self, quantity: i32) -> Option<Money> {
        self.0.checked_mul(Decimal::from(quantity)).map(Money)
    }

    fn normalized(&self) -> Decimal {
        let mut amount = self.0;
        if amount.scale() < 2 {
            amount.rescale(2);
        }
        amount
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.normalized())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <Decimal as Deserialize>::deserialize(deserializer).map(Money)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn multiply_keeps_exact_scale() {
        let price = Money::new(dec!(3.50));
        assert_eq!(price.checked_multiply(5).unwrap().to_string(), "17.50");
    }

    #[test]
    fn zero_renders_with_two_digits() {
        assert_eq!(Money::zero().to_string(), "0.00");
        assert_eq!(Money::default().to_string(), "0.00");
    }

    #[test]
    fn display_pads_but_never_rounds() {
        assert_eq!(Money::new(dec!(12.3)).to_string(), "12.30");
        assert_eq!(Money::new(dec!(4)).to_string(), "4.00");
        assert_eq!(Money::new(dec!(0.125)).to_string(), "0.125");
    }

    #[test]
    fn addition_is_exact() {
        let mut total = Money::zero();
        for _ in 0..10 {
            total = total.checked_add(Money::new(dec!(0.10))).unwrap();
        }
        assert_eq!(total, Money::new(dec!(1.00)));
        assert_eq!(total.to_string(), "1.00");
    }

    #[test]
    fn overflow_is_reported() {
        let huge = Money::new(Decimal::MAX);
        assert!(huge.checked_multiply(2).is_none());
        assert!(huge.checked_add(huge).is_none());
    }

    #[test]
    fn sign_checks() {
        assert!(Money::new(dec!(-1.00)).is_negative());
        assert!(!Money::zero().is_negative());
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Money::new(dec!(3.5))).unwrap();
        assert_eq!(json, "\"3.50\"");
    }

    #[test]
    fn deserializes_from_string_and_number() {
        let from_str: Money = serde_json::from_str("\"3.50\"").unwrap();
        assert_eq!(from_str.to_string(), "3.50");

        let from_int: Money = serde_json::from_str("4").unwrap();
        assert_eq!(from_int, Money::new(dec!(4)));
    }

    #[test]
    fn parses_from_str() {
        let money: Money = "17.50".parse().unwrap();
        assert_eq!(money, Money::new(dec!(17.50)));
        assert!("abc".parse::<Money>().is_err());
    }
}
