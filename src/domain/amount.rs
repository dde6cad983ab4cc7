//! Arbitrary-precision non-negative token amounts backed by a 256-bit integer.
//!
//! Amounts serialize as canonical decimal strings and accept decimal strings,
//! `0x`-prefixed hex strings or plain JSON integers on input.

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Non-negative on-chain quantity (token units, shares, scaled USD).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256::ZERO);

    pub fn new(value: U256) -> Self {
        Amount(value)
    }

    pub fn from_u64(value: u64) -> Self {
        Amount(U256::from(value))
    }

    pub fn from_u128(value: u128) -> Self {
        Amount(U256::from(value))
    }

    /// `10^exp`, saturating at the maximum value.
    pub fn pow10(exp: u32) -> Self {
        let ten = U256::from(10u64);
        let mut value = U256::from(1u64);
        for _ in 0..exp {
            value = value.saturating_mul(ten);
        }
        Amount(value)
    }

    /// Get the underlying integer.
    pub fn inner(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero()
    }

    pub fn saturating_add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    pub fn saturating_mul(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_mul(rhs.0))
    }

    /// Truncating division. Returns `None` when `rhs` is zero.
    pub fn checked_div(self, rhs: Amount) -> Option<Amount> {
        if rhs.is_zero() {
            return None;
        }
        Some(Amount(self.0 / rhs.0))
    }

    /// `self * numerator / denominator` with truncation. `None` when the
    /// denominator is zero. Falls back to dividing first if the product overflows.
    pub fn mul_div(self, numerator: Amount, denominator: Amount) -> Option<Amount> {
        if denominator.is_zero() {
            return None;
        }
        match self.0.checked_mul(numerator.0) {
            Some(product) => Some(Amount(product / denominator.0)),
            None => Some(Amount((self.0 / denominator.0).saturating_mul(numerator.0))),
        }
    }

    /// Lossy conversion for ratios and logging. `None` above `u128::MAX`.
    pub fn to_u128(&self) -> Option<u128> {
        u128::try_from(self.0).ok()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid amount: {0}")]
pub struct AmountParseError(String);

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::ZERO);
        }
        U256::from_str(trimmed)
            .map(Amount)
            .map_err(|_| AmountParseError(trimmed.to_string()))
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount::from_u64(value)
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        self.saturating_add(rhs)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, x| acc + x)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Str(s) => Amount::from_str(&s).map_err(serde::de::Error::custom),
            Raw::Num(n) => Ok(Amount::from_u64(n)),
        }
    }
}

/// Parse an amount, treating anything unparsable as zero.
pub fn to_amount(value: &str) -> Amount {
    Amount::from_str(value).unwrap_or_default()
}
