//! Amount type
//!
//! Domain primitive for monetary amounts. Amounts are whole units of the
//! account currency (IDR has no minor unit in practice), stored as BIGINT.
//! All amounts are validated at construction time, ensuring invalid values
//! cannot exist in the system.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Maximum amount accepted for a single ledger record (1 trillion)
const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Amount represents a validated, strictly positive monetary value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum value is 1 trillion
///
/// # Example
/// ```
/// use selfbank::domain::Amount;
///
/// let amount = Amount::new(1000).unwrap();
/// assert_eq!(amount.value(), 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(i64),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::Overflow` if value > 1 trillion
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value <= 0 {
            return Err(AmountError::NotPositive(value));
        }

        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    /// Create an Amount from an unsigned wire value.
    pub fn from_unsigned(value: u64) -> Result<Self, AmountError> {
        let value = i64::try_from(value).map_err(|_| AmountError::Overflow)?;
        Self::new(value)
    }

    /// Get the underlying value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(value)
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Balance is a derived account balance.
///
/// Unlike Amount, Balance can be zero. It can also be negative when the
/// stored ledger is inconsistent (e.g. records written before debit checks
/// were atomic), so construction is unchecked and callers compare instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(i64);

impl Balance {
    /// Create a balance from a raw aggregate
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(0)
    }

    /// Get the underlying value
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Check if balance covers a debit of `amount` (equality is enough)
    pub fn covers(&self, amount: &Amount) -> bool {
        self.0 >= amount.value()
    }
}

impl Add<Amount> for Balance {
    type Output = Balance;

    fn add(self, rhs: Amount) -> Self::Output {
        Balance(self.0.saturating_add(rhs.value()))
    }
}

impl Sub<Amount> for Balance {
    type Output = Balance;

    fn sub(self, rhs: Amount) -> Self::Output {
        Balance(self.0.saturating_sub(rhs.value()))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(100);
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), 100);
    }

    #[test]
    fn test_amount_zero_rejected() {
        let amount = Amount::new(0);
        assert!(matches!(amount, Err(AmountError::NotPositive(0))));
    }

    #[test]
    fn test_amount_negative_rejected() {
        let amount = Amount::new(-100);
        assert!(matches!(amount, Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_overflow() {
        let amount = Amount::new(MAX_AMOUNT + 1);
        assert!(matches!(amount, Err(AmountError::Overflow)));
        assert!(Amount::new(MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_amount_from_unsigned_overflow() {
        assert!(matches!(
            Amount::from_unsigned(u64::MAX),
            Err(AmountError::Overflow)
        ));
        assert_eq!(Amount::from_unsigned(50).unwrap().value(), 50);
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Amount = " 250 ".parse().unwrap();
        assert_eq!(amount.value(), 250);

        let bad: Result<Amount, _> = "12.5".parse();
        assert!(matches!(bad, Err(AmountError::ParseError(_))));
    }

    #[test]
    fn test_amount_deserialize_rejects_zero() {
        let ok: Amount = serde_json::from_str("1000").unwrap();
        assert_eq!(ok.value(), 1000);

        let zero: Result<Amount, _> = serde_json::from_str("0");
        assert!(zero.is_err());
    }

    #[test]
    fn test_balance_covers_boundary() {
        let balance = Balance::new(700);

        assert!(balance.covers(&Amount::new(700).unwrap()));
        assert!(balance.covers(&Amount::new(699).unwrap()));
        assert!(!balance.covers(&Amount::new(701).unwrap()));
    }

    #[test]
    fn test_balance_arithmetic() {
        let balance = Balance::zero() + Amount::new(1000).unwrap();
        let balance = balance - Amount::new(300).unwrap();
        assert_eq!(balance.value(), 700);

        let negative = Balance::zero() - Amount::new(5).unwrap();
        assert_eq!(negative.value(), -5);
        assert!(!negative.covers(&Amount::new(1).unwrap()));
    }
}
