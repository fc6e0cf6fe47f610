//! Decimal price parsing and smallest-unit conversion.
//!
//! Resource prices are configured as human-readable currency strings
//! (`"1.00"`, `"$0.10"`). Challenges quote amounts in the settlement asset's
//! smallest integer unit, so conversion multiplies by `10^decimals` and
//! **truncates** any precision beyond the asset's decimals. Truncation (never
//! rounding) keeps the quoted amount deterministic and avoids ever charging
//! above the configured price.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// A non-negative decimal currency amount parsed from a configuration string.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(Decimal);

/// Errors from parsing or converting a price string.
#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountError {
    #[error("invalid number format")]
    InvalidFormat,
    #[error("negative value is not allowed")]
    Negative,
    #[error("amount must be between {} and {}", limits::MIN_STR, limits::MAX_STR)]
    OutOfRange,
    #[error("amount overflows {decimals}-decimal token units")]
    Overflow { decimals: u32 },
}

mod limits {
    use super::*;

    pub const MIN_STR: &str = "0.000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: Lazy<Decimal> =
        Lazy::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: Lazy<Decimal> =
        Lazy::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
}

static CLEANUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d\.\-]+").expect("valid regex"));

impl MoneyAmount {
    /// Parses a currency string, tolerating symbols and thousand separators.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountError> {
        let cleaned = CLEANUP.replace_all(input, "");
        let parsed = Decimal::from_str(&cleaned).map_err(|_| MoneyAmountError::InvalidFormat)?;
        if parsed.is_sign_negative() {
            return Err(MoneyAmountError::Negative);
        }
        if parsed < *limits::MIN || parsed > *limits::MAX {
            return Err(MoneyAmountError::OutOfRange);
        }
        Ok(MoneyAmount(parsed))
    }

    /// Converts to the asset's smallest integer unit, truncating excess precision.
    ///
    /// `"0.10"` with 6 decimals yields `100_000`; `"0.1000005"` also yields
    /// `100_000` because the seventh decimal digit is cut, not rounded.
    pub fn to_token_units(&self, decimals: u32) -> Result<u128, MoneyAmountError> {
        let multiplier = 10u64
            .checked_pow(decimals)
            .ok_or(MoneyAmountError::Overflow { decimals })?;
        let scaled = self
            .0
            .checked_mul(Decimal::from(multiplier))
            .ok_or(MoneyAmountError::Overflow { decimals })?;
        let truncated = scaled.trunc().normalize();
        Ok(truncated.mantissa().unsigned_abs())
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_symbolic() {
        assert_eq!(MoneyAmount::parse("1.00").unwrap().to_string(), "1");
        assert_eq!(MoneyAmount::parse("$0.10").unwrap().to_string(), "0.1");
        assert_eq!(MoneyAmount::parse("1,000.50").unwrap().to_string(), "1000.5");
    }

    #[test]
    fn rejects_garbage_and_negatives() {
        assert!(matches!(
            MoneyAmount::parse("free"),
            Err(MoneyAmountError::InvalidFormat)
        ));
        assert!(matches!(
            MoneyAmount::parse("-1"),
            Err(MoneyAmountError::Negative)
        ));
    }

    #[test]
    fn converts_to_six_decimal_units() {
        let amount = MoneyAmount::parse("0.10").unwrap();
        assert_eq!(amount.to_token_units(6).unwrap(), 100_000);
        let amount = MoneyAmount::parse("1.00").unwrap();
        assert_eq!(amount.to_token_units(6).unwrap(), 1_000_000);
    }

    #[test]
    fn truncates_instead_of_rounding() {
        let amount = MoneyAmount::parse("0.1000005").unwrap();
        assert_eq!(amount.to_token_units(6).unwrap(), 100_000);
        let amount = MoneyAmount::parse("0.9999999").unwrap();
        assert_eq!(amount.to_token_units(6).unwrap(), 999_999);
    }
}
