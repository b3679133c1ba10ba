//! Ledger data model
//!
//! Accounts, ledger entries and the caller-supplied idempotency key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::amount::{Amount, Balance};
use super::error::LedgerError;

/// Maximum length of an external transaction id (matches the column width)
pub const MAX_EXTERNAL_ID_LEN: usize = 255;

/// An account holding a non-negative balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub balance: Balance,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance.
    ///
    /// The name is trimmed and must not be blank.
    pub fn open(name: &str) -> Result<Self, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidRequest("Name is required".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            balance: Balance::zero(),
            created_at: Utc::now(),
        })
    }

    /// Return a copy of this account carrying `balance`
    pub fn with_balance(&self, balance: Balance) -> Self {
        Self {
            balance,
            ..self.clone()
        }
    }
}

/// Kind of balance mutation recorded by a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[serde(rename = "topup")]
    TopUp,
    Charge,
}

impl TransactionType {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::TopUp => "topup",
            TransactionType::Charge => "charge",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topup" => Ok(TransactionType::TopUp),
            "charge" => Ok(TransactionType::Charge),
            other => Err(LedgerError::Storage(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

/// Caller-supplied idempotency key, unique across the whole ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalTransactionId(String);

impl ExternalTransactionId {
    pub fn new(value: impl Into<String>) -> Result<Self, LedgerError> {
        let value = value.into();

        // Stored exactly as sent; only whitespace-only keys are refused
        if value.trim().is_empty() {
            return Err(LedgerError::InvalidRequest(
                "Transaction ID is required".to_string(),
            ));
        }
        if value.chars().count() > MAX_EXTERNAL_ID_LEN {
            return Err(LedgerError::InvalidRequest(format!(
                "Transaction ID exceeds {} characters",
                MAX_EXTERNAL_ID_LEN
            )));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ExternalTransactionId {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ExternalTransactionId::new(value)
    }
}

impl From<ExternalTransactionId> for String {
    fn from(id: ExternalTransactionId) -> Self {
        id.0
    }
}

/// Immutable audit record of one applied balance mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub external_transaction_id: ExternalTransactionId,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Amount,
    pub balance_after: Balance,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry about to be appended; the store assigns `created_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub external_transaction_id: ExternalTransactionId,
    pub transaction_type: TransactionType,
    pub amount: Amount,
    pub balance_after: Balance,
}

impl NewLedgerEntry {
    pub fn new(
        account_id: Uuid,
        external_transaction_id: ExternalTransactionId,
        transaction_type: TransactionType,
        amount: Amount,
        balance_after: Balance,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            external_transaction_id,
            transaction_type,
            amount,
            balance_after,
        }
    }

    /// Materialize the entry with its persistence timestamp
    pub fn persisted_at(self, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            account_id: self.account_id,
            external_transaction_id: self.external_transaction_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            balance_after: self.balance_after,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_account_starts_at_zero() {
        let account = Account::open("  Alice  ").unwrap();
        assert_eq!(account.name, "Alice");
        assert_eq!(account.balance.to_string(), "0.00");
    }

    #[test]
    fn test_open_account_blank_name_rejected() {
        assert!(matches!(
            Account::open("   "),
            Err(LedgerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_transaction_type_round_trip() {
        assert_eq!("topup".parse::<TransactionType>().unwrap(), TransactionType::TopUp);
        assert_eq!("charge".parse::<TransactionType>().unwrap(), TransactionType::Charge);
        assert!("refund".parse::<TransactionType>().is_err());
        assert_eq!(
            serde_json::to_string(&TransactionType::TopUp).unwrap(),
            r#""topup""#
        );
    }

    #[test]
    fn test_external_id_validation() {
        assert_eq!(ExternalTransactionId::new(" tx-1 ").unwrap().as_str(), " tx-1 ");
        assert_ne!(
            ExternalTransactionId::new(" tx-1").unwrap(),
            ExternalTransactionId::new("tx-1").unwrap()
        );
        assert!(ExternalTransactionId::new("").is_err());
        assert!(ExternalTransactionId::new(" \t ").is_err());
        assert!(ExternalTransactionId::new("x".repeat(256)).is_err());
        assert!(ExternalTransactionId::new("x".repeat(255)).is_ok());
    }

    #[test]
    fn test_entry_serializes_type_field() {
        let entry = NewLedgerEntry::new(
            Uuid::new_v4(),
            ExternalTransactionId::new("tx-1").unwrap(),
            TransactionType::TopUp,
            Amount::new(dec!(100)).unwrap(),
            Balance::new(dec!(100)).unwrap(),
        )
        .persisted_at(Utc::now());

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "topup");
        assert_eq!(json["amount"], "100.00");
        assert_eq!(json["balance_after"], "100.00");
        assert_eq!(json["external_transaction_id"], "tx-1");
    }
}
