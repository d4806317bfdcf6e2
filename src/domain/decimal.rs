//! Lossless money type backed by rust_decimal.
//!
//! Amounts are parsed from and rendered to canonical strings (no exponent,
//! no trailing zeros). SQLite stores them as TEXT so SUM() never goes through
//! floating point.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless decimal amount.
///
/// Serializes to a JSON string so that clients never see float rounding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// `self - rhs`, floored at zero.
    pub fn saturating_sub(self, rhs: Decimal) -> Decimal {
        let diff = Decimal(self.0.saturating_sub(rhs.0));
        if diff.is_negative() {
            Decimal::zero()
        } else {
            diff
        }
    }

    /// `self + rhs`, or `None` past the representable range.
    pub fn checked_add(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    /// `self - rhs`, or `None` past the representable range.
    pub fn checked_sub(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_sub(rhs.0).map(Decimal)
    }

    pub fn saturating_add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0.saturating_add(rhs.0))
    }

    /// True for a usable money amount: at most `MAX_AMOUNT_SCALE` fractional
    /// digits and no larger than `MAX_AMOUNT` in magnitude.
    pub fn is_within_amount_bounds(&self) -> bool {
        self.0.normalize().scale() <= MAX_AMOUNT_SCALE
            && self.0.abs() <= RustDecimal::from(MAX_AMOUNT)
    }
}

/// Most fractional digits an amount may carry.
pub const MAX_AMOUNT_SCALE: u32 = 8;

/// Largest amount accepted from a client or the processor.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

/// Saturates instead of panicking; an overflowed total shows up as a
/// summary that no longer matches the balance.
impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), Decimal::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_canonical_strips_trailing_zeros() {
        let decimal = Decimal::from_str_canonical("50.00").unwrap();
        assert_eq!(decimal.to_canonical_string(), "50");

        let decimal = Decimal::from_str_canonical("0.10").unwrap();
        assert_eq!(decimal.to_canonical_string(), "0.1");
    }

    #[test]
    fn test_decimal_parse_trims_whitespace() {
        let decimal = Decimal::from_str_canonical(" 12.5 ").unwrap();
        assert_eq!(decimal.to_canonical_string(), "12.5");
    }

    #[test]
    fn test_decimal_rejects_garbage() {
        assert!(Decimal::from_str_canonical("abc").is_err());
        assert!(Decimal::from_str_canonical("").is_err());
    }

    #[test]
    fn test_decimal_arithmetic_is_exact() {
        let a = Decimal::from_str_canonical("0.1").unwrap();
        let b = Decimal::from_str_canonical("0.2").unwrap();
        assert_eq!(a.checked_add(b).unwrap().to_canonical_string(), "0.3");

        let acc: Decimal = [a, b].into_iter().sum();
        assert_eq!(acc, Decimal::from_str_canonical("0.3").unwrap());
    }

    #[test]
    fn test_decimal_sign_predicates() {
        let pos = Decimal::from_str_canonical("1").unwrap();
        let neg = Decimal::from_str_canonical("-1").unwrap();
        let zero = Decimal::zero();

        assert!(pos.is_positive() && !pos.is_negative());
        assert!(neg.is_negative() && !neg.is_positive());
        assert!(!zero.is_positive() && !zero.is_negative() && zero.is_zero());
    }

    #[test]
    fn test_decimal_saturating_sub_floors_at_zero() {
        let ten = Decimal::from_str_canonical("10").unwrap();
        let thirty = Decimal::from_str_canonical("30").unwrap();
        assert_eq!(ten.saturating_sub(thirty), Decimal::zero());
        assert_eq!(
            thirty.saturating_sub(ten),
            Decimal::from_str_canonical("20").unwrap()
        );
    }

    #[test]
    fn test_decimal_checked_arithmetic_reports_overflow() {
        let max = Decimal::new(RustDecimal::MAX);
        let one = Decimal::from_str_canonical("1").unwrap();
        assert_eq!(max.checked_add(one), None);
        assert_eq!(Decimal::new(RustDecimal::MIN).checked_sub(one), None);
        assert_eq!(one.checked_add(one), Some(Decimal::from_str_canonical("2").unwrap()));

        let total: Decimal = [max, max].into_iter().sum();
        assert_eq!(total, max);
        assert_eq!(Decimal::new(RustDecimal::MIN).saturating_sub(max), Decimal::zero());
    }

    #[test]
    fn test_decimal_amount_bounds() {
        let ok = ["0.01", "25.5", "1000000000000000", "0.12345678", "1.50000000000"];
        for s in ok {
            assert!(Decimal::from_str_canonical(s).unwrap().is_within_amount_bounds(), "{}", s);
        }
        let too_big = Decimal::new(RustDecimal::MAX);
        assert!(!too_big.is_within_amount_bounds());
        assert!(!Decimal::from_str_canonical("1000000000000000.01")
            .unwrap()
            .is_within_amount_bounds());
        assert!(!Decimal::from_str_canonical("0.123456789")
            .unwrap()
            .is_within_amount_bounds());
    }

    #[test]
    fn test_decimal_sum() {
        let total: Decimal = ["1.5", "2.25", "0.25"]
            .iter()
            .map(|s| Decimal::from_str_canonical(s).unwrap())
            .sum();
        assert_eq!(total.to_canonical_string(), "4");
    }

    #[test]
    fn test_decimal_json_serialization_is_string() {
        let decimal = Decimal::from_str_canonical("123.456").unwrap();
        let json = serde_json::to_value(decimal).unwrap();
        assert!(json.is_string());

        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, decimal);
    }
}
