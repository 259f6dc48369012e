//! Exact decimal amounts for public and shielded balances

use crate::error::{ShieldedError, ShieldedResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A non-negative, exact decimal amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Decimal", try_from = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Wrap a decimal, rejecting negative values
    pub fn new(value: Decimal) -> ShieldedResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ShieldedError::InvalidAmount(format!(
                "{} is negative",
                value
            )));
        }
        Ok(Self(value.normalize()))
    }

    /// Wrap a decimal that must be strictly positive (transaction amounts)
    pub fn positive(value: Decimal) -> ShieldedResult<Self> {
        if value <= Decimal::ZERO {
            return Err(ShieldedError::InvalidAmount(format!(
                "{} is not greater than zero",
                value
            )));
        }
        Ok(Self(value.normalize()))
    }

    /// Parse a user-entered transaction amount
    ///
    /// Accepts a bare number (`"0.5"`) or a number followed by an asset
    /// symbol (`"0.5 ETH"`). Non-numeric, zero and negative inputs fail with
    /// `InvalidAmount`.
    pub fn parse(input: &str) -> ShieldedResult<Self> {
        Self::parse_for_asset(input, None)
    }

    /// Parse a transaction amount whose optional asset suffix must match `asset`
    pub fn parse_for_asset(input: &str, asset: Option<&str>) -> ShieldedResult<Self> {
        let trimmed = input.trim();
        let mut parts = trimmed.split_whitespace();
        let number = parts
            .next()
            .ok_or_else(|| ShieldedError::InvalidAmount("empty amount".to_string()))?;

        if let Some(suffix) = parts.next() {
            if let Some(expected) = asset {
                if !suffix.eq_ignore_ascii_case(expected) {
                    return Err(ShieldedError::InvalidAmount(format!(
                        "expected asset {}, got {}",
                        expected, suffix
                    )));
                }
            }
        }
        if parts.next().is_some() {
            return Err(ShieldedError::InvalidAmount(format!(
                "unexpected trailing input in '{}'",
                trimmed
            )));
        }

        let value = Decimal::from_str(number)
            .map_err(|_| ShieldedError::InvalidAmount(format!("'{}' is not a number", number)))?;
        Self::positive(value)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(|v| Amount(v.normalize()))
    }

    /// Subtract, returning `None` if the result would be negative
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        if other.0 > self.0 {
            return None;
        }
        self.0.checked_sub(other.0).map(|v| Amount(v.normalize()))
    }

    /// Canonical string form used inside commitments
    pub fn canonical(&self) -> String {
        self.0.normalize().to_string()
    }

    /// Render as the UI does, e.g. `"1.245 ETH"`
    pub fn display_with(&self, asset: &str) -> String {
        format!("{} {}", self.canonical(), asset)
    }

    /// Sum amounts, failing on overflow
    pub fn sum<I>(amounts: I) -> ShieldedResult<Amount>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts.into_iter().try_fold(Amount::ZERO, |acc, a| {
            acc.checked_add(a)
                .ok_or_else(|| ShieldedError::InvalidAmount("amount overflow".to_string()))
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ShieldedError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Amount {
    type Err = ShieldedError;

    /// Parses balances, which may be zero
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| ShieldedError::InvalidAmount(format!("'{}' is not a number", s)))?;
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_plain_and_suffixed() {
        assert_eq!(Amount::parse("1.245").unwrap(), amt("1.245"));
        assert_eq!(Amount::parse(" 0.5 ETH ").unwrap(), amt("0.5"));
        assert_eq!(
            Amount::parse_for_asset("1000 ATOS", Some("ATOS")).unwrap(),
            amt("1000")
        );
    }

    #[test]
    fn test_parse_rejects_invalid_input() {
        for input in ["", "abc", "0", "0.000", "-1", "1.0 ETH extra", "NaN"] {
            let err = Amount::parse(input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAmount, "input: {:?}", input);
        }
    }

    #[test]
    fn test_parse_rejects_wrong_asset() {
        let result = Amount::parse_for_asset("1 ETH", Some("ATOS"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn test_checked_arithmetic_is_exact() {
        let balance = amt("1.245");
        let remaining = balance.checked_sub(amt("1.0")).unwrap();
        assert_eq!(remaining, amt("0.245"));
        assert_eq!(remaining.checked_add(amt("1")).unwrap(), balance);
        assert!(remaining.checked_sub(amt("0.246")).is_none());
    }

    #[test]
    fn test_canonical_form_ignores_trailing_zeros() {
        assert_eq!(amt("1.000").canonical(), "1");
        assert_eq!(amt("0.50").canonical(), "0.5");
        assert_eq!(amt("1.0"), amt("1"));
    }

    #[test]
    fn test_display_with_asset() {
        assert_eq!(amt("1.245").display_with("ETH"), "1.245 ETH");
    }

    #[test]
    fn test_deserialize_rejects_negative_amounts() {
        assert!(serde_json::from_str::<Amount>("\"-5\"").is_err());
        assert!(serde_json::from_str::<Amount>("\"-0.001\"").is_err());

        let parsed: Amount = serde_json::from_str("\"1.50\"").unwrap();
        assert_eq!(parsed, amt("1.5"));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"1.5\"");
    }

    #[test]
    fn test_sum() {
        let amounts = vec![amt("0.5"), amt("0.25"), amt("0.25")];
        assert_eq!(Amount::sum(amounts).unwrap(), amt("1"));
        assert_eq!(Amount::sum(Vec::new()).unwrap(), Amount::ZERO);
    }
}
