//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Used for USD prices and price derivation scales. Conversion into the
//! integer domain goes through a fixed price scale.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::amount::Amount;

/// Fixed-point scale applied to USD prices before integer math (1e8).
pub const PRICE_SCALE_DECIMALS: u32 = 8;

/// Lossless decimal numeric type for prices and ratios.
///
/// Serializes to JSON number (not string) so feed responses deserialize directly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Convert a feed float. `None` for NaN or infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        RustDecimal::from_f64(value).map(Decimal)
    }

    /// Build `numerator / denominator` truncated to `precision` fractional digits.
    ///
    /// Returns `None` when the denominator is zero or the ratio does not fit.
    pub fn from_ratio(numerator: Amount, denominator: Amount, precision: u32) -> Option<Self> {
        let scaled = numerator
            .saturating_mul(Amount::pow10(precision))
            .checked_div(denominator)?;
        let mantissa = i128::try_from(scaled.to_u128()?).ok()?;
        RustDecimal::try_from_i128_with_scale(mantissa, precision)
            .ok()
            .map(|d| Decimal(d.normalize()))
    }

    /// Multiply, returning `None` on overflow.
    pub fn checked_mul(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    /// The price as an integer at [`PRICE_SCALE_DECIMALS`], truncated.
    /// Non-positive prices map to zero.
    pub fn to_price_units(&self) -> Amount {
        if !self.is_positive() {
            return Amount::ZERO;
        }
        let scaled = self.0 * RustDecimal::from(10u64.pow(PRICE_SCALE_DECIMALS));
        scaled
            .trunc()
            .to_u128()
            .map(Amount::from_u128)
            .unwrap_or(Amount::ZERO)
    }
}

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

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse_roundtrip() {
        let test_cases = vec!["123.456", "0.0001", "1000000", "0", "999999999.999999999"];

        for s in test_cases {
            let decimal = Decimal::from_str_canonical(s).expect("parse failed");
            let formatted = decimal.to_canonical_string();
            let reparsed = Decimal::from_str_canonical(&formatted).expect("reparse failed");
            assert_eq!(decimal, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_decimal_json_serialization() {
        let decimal = Decimal::from_str_canonical("2.5").unwrap();
        let json = serde_json::to_value(decimal).unwrap();
        assert!(json.is_number());
        let back: Decimal = serde_json::from_str("2.5").unwrap();
        assert_eq!(back, decimal);
    }

    #[test]
    fn test_price_units_truncate_at_eight_decimals() {
        let price = Decimal::from_str_canonical("2").unwrap();
        assert_eq!(price.to_price_units(), Amount::from_u64(200_000_000));

        let tiny = Decimal::from_str_canonical("0.000000019").unwrap();
        assert_eq!(tiny.to_price_units(), Amount::from_u64(1));

        let negative = Decimal::from_str_canonical("-3").unwrap();
        assert_eq!(negative.to_price_units(), Amount::ZERO);
    }

    #[test]
    fn test_from_ratio() {
        let ratio = Decimal::from_ratio(Amount::from_u64(3), Amount::from_u64(2), 6).unwrap();
        assert_eq!(ratio.to_canonical_string(), "1.5");

        let third = Decimal::from_ratio(Amount::from_u64(1), Amount::from_u64(3), 6).unwrap();
        assert_eq!(third.to_canonical_string(), "0.333333");

        assert!(Decimal::from_ratio(Amount::from_u64(1), Amount::ZERO, 6).is_none());
    }

    #[test]
    fn test_checked_mul() {
        let a = Decimal::from_str_canonical("10.5").unwrap();
        let b = Decimal::from_str_canonical("2").unwrap();
        assert_eq!(a.checked_mul(b).unwrap().to_canonical_string(), "21");
    }
}
