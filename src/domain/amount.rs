//! Money primitives
//!
//! Monetary amounts, account balances and FX rates. Money is always held at
//! two fractional digits and rates at eight, both rounded half-up, so every
//! value that reaches a comparison or the store has already been normalised.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum allowed amount or balance (1 trillion in any currency)
const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Fractional digits kept for money
pub const MONEY_SCALE: u32 = 2;

/// Fractional digits kept for FX rates
pub const RATE_SCALE: u32 = 8;

/// Round to 2 decimal places, half-up, with the scale fixed at 2.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Round to 8 decimal places, half-up, with the scale fixed at 8.
pub fn round_rate(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(RATE_SCALE);
    rounded
}

/// Amount represents a validated, strictly positive monetary value.
///
/// # Invariants
/// - Rounded to 2 decimal places (half-up) at construction
/// - Value is positive (> 0) after rounding
/// - Maximum value is 1 trillion
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use raxbank_ledger::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(10005, 3)).unwrap();
/// assert_eq!(amount.value(), Decimal::new(1001, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount or Balance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Balance cannot be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount, rounding to cents first.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if the rounded value is <= 0
    /// - `AmountError::Overflow` if value > 1 trillion
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        let rounded = round_money(value);

        if rounded <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        if rounded > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }

        Ok(Self(rounded))
    }

    /// Build an amount from gateway minor units (cents).
    pub fn from_minor_units(minor: i64) -> Result<Self, AmountError> {
        Self::new(Decimal::new(minor, MONEY_SCALE))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::from_str(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        format!("{:.2}", amount.0)
    }
}

/// Balance represents an account balance (zero or positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Balance(Decimal);

impl Balance {
    /// Create a new balance (zero or positive), normalised to cents
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        let rounded = round_money(value);

        if rounded < Decimal::ZERO {
            return Err(AmountError::Negative(rounded));
        }

        if rounded > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }

        Ok(Self(rounded))
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(round_money(Decimal::ZERO))
    }

    /// Get the underlying value
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Check if balance covers a withdrawal
    pub fn is_sufficient_for(&self, amount: &Amount) -> bool {
        self.0 >= amount.value()
    }

    /// Apply a signed delta; fails rather than going below zero.
    pub fn apply(&self, delta: Decimal) -> Result<Balance, AmountError> {
        Balance::new(self.0 + delta)
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Balance::new(value)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

/// Ratio of credited to debited amount, kept at 8 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxRate(Decimal);

impl FxRate {
    /// Rate used when no conversion took place
    pub fn identity() -> Self {
        Self(round_rate(Decimal::ONE))
    }

    /// `to / from`, rounded half-up to 8 places.
    pub fn between(from: &Amount, to: &Amount) -> Self {
        Self(round_rate(to.value() / from.value()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for FxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.8}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_money(dec!(30)).to_string(), "30.00");
    }

    #[test]
    fn test_round_rate_scale() {
        assert_eq!(round_rate(dec!(0.123456785)), dec!(0.12345679));
        assert_eq!(round_rate(Decimal::ONE).to_string(), "1.00000000");
    }

    #[test]
    fn test_max_amount_constant() {
        assert_eq!(MAX_AMOUNT, dec!(1000000000000));
    }

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(dec!(100)).unwrap();
        assert_eq!(amount.value(), dec!(100.00));
        assert_eq!(amount.to_string(), "100.00");
    }

    #[test]
    fn test_amount_zero_and_negative_rejected() {
        assert!(matches!(Amount::new(Decimal::ZERO), Err(AmountError::NotPositive(_))));
        assert!(matches!(Amount::new(dec!(-5)), Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_rounding_to_zero_rejected() {
        // 0.004 rounds to 0.00
        assert!(matches!(Amount::new(dec!(0.004)), Err(AmountError::NotPositive(_))));
        assert_eq!(Amount::new(dec!(0.005)).unwrap().value(), dec!(0.01));
    }

    #[test]
    fn test_amount_overflow() {
        assert!(matches!(Amount::new(dec!(1000000000000.01)), Err(AmountError::Overflow)));
        assert!(Amount::new(dec!(1000000000000)).is_ok());
    }

    #[test]
    fn test_amount_from_minor_units() {
        assert_eq!(Amount::from_minor_units(5000).unwrap().value(), dec!(50.00));
        assert!(Amount::from_minor_units(0).is_err());
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Amount = "123.456".parse().unwrap();
        assert_eq!(amount.value(), dec!(123.46));
        assert!(matches!("abc".parse::<Amount>(), Err(AmountError::ParseError(_))));
    }

    #[test]
    fn test_balance_apply() {
        let balance = Balance::new(dec!(100)).unwrap();
        let balance = balance.apply(dec!(-30)).unwrap();
        assert_eq!(balance.value(), dec!(70.00));

        let result = balance.apply(dec!(-70.01));
        assert!(matches!(result, Err(AmountError::Negative(_))));

        assert!(balance.apply(dec!(-70)).unwrap().is_zero());
    }

    #[test]
    fn test_balance_sufficient() {
        let balance = Balance::new(dec!(50)).unwrap();
        assert!(balance.is_sufficient_for(&Amount::new(dec!(50)).unwrap()));
        assert!(!balance.is_sufficient_for(&Amount::new(dec!(50.01)).unwrap()));
    }

    #[test]
    fn test_fx_rate() {
        assert_eq!(FxRate::identity().to_string(), "1.00000000");

        let from = Amount::new(dec!(20.00)).unwrap();
        let to = Amount::new(dec!(86.00)).unwrap();
        assert_eq!(FxRate::between(&from, &to).value(), dec!(4.30000000));

        let from = Amount::new(dec!(3)).unwrap();
        let to = Amount::new(dec!(1)).unwrap();
        assert_eq!(FxRate::between(&from, &to).value(), dec!(0.33333333));
    }
}
