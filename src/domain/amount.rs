//! Amount type
//!
//! Domain primitives for monetary values. Every value is held as an exact
//! `Decimal` carrying exactly 2 fractional digits; anything more precise is
//! rounded half-up (away from zero at the midpoint) at construction time, so
//! comparisons and arithmetic never see binary floating point or stray scale.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits kept for every monetary value
pub const MONEY_SCALE: u32 = 2;

/// Maximum magnitude of a single top-up or charge (1 trillion)
/// (lo = 1e12 mod 2^32, mid = 1e12 / 2^32)
const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Largest balance the `NUMERIC(28, 2)` column can hold
/// (99,999,999,999,999,999,999,999,999.99)
pub const MAX_BALANCE: Decimal = Decimal::from_parts(268_435_455, 1_042_612_833, 542_101_086, false, 2);

/// Round a decimal to the money scale and pin its scale to exactly 2 digits.
///
/// `10.005` becomes `10.01`, `-10.005` becomes `-10.01`, `7` becomes `7.00`.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Amount represents the requested magnitude of a top-up or charge.
///
/// # Invariants
/// - Value is always positive (> 0) after rounding
/// - Exactly 2 decimal places
/// - Maximum value is 1 trillion
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use wallet_ledger::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(10005, 3)).unwrap();
/// assert_eq!(amount.to_string(), "10.01");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
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

    #[error("Balance would exceed maximum allowed value ({MAX_BALANCE})")]
    BalanceLimit,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount, rounding to 2 decimal places first.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if the rounded value is <= 0
    /// - `AmountError::Overflow` if the value exceeds 1 trillion
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

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Balance represents an account balance (zero or positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Balance(Decimal);

impl Balance {
    /// Create a new balance (zero or positive), rounded to 2 decimal places
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        let rounded = round_money(value);
        if rounded < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }
        if rounded > MAX_BALANCE {
            return Err(AmountError::BalanceLimit);
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

    /// Check if balance covers a charge of `amount`
    pub fn is_sufficient_for(&self, amount: &Amount) -> bool {
        self.0 >= amount.value()
    }

    /// Add amount to balance, failing with `BalanceLimit` past
    /// [`MAX_BALANCE`]
    pub fn credit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        let new_value = self
            .0
            .checked_add(amount.value())
            .ok_or(AmountError::BalanceLimit)?;
        Balance::new(new_value)
    }

    /// Subtract amount from balance, failing with `Negative` if the result
    /// would drop below zero
    pub fn debit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        let new_value = self.0 - amount.value();
        Balance::new(new_value)
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

impl TryFrom<Decimal> for Balance {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Balance::new(value)
    }
}

impl From<Balance> for Decimal {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}
