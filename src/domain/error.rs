//! Ledger Error Types
//!
//! Outcomes of the balance-mutation protocol that are not a success. Each
//! kind is distinguishable so callers can choose between retrying and
//! surfacing a rejection.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::amount::AmountError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// The external transaction id was already applied. Nothing changed.
    #[error("Duplicate transaction: {external_transaction_id}")]
    DuplicateTransaction { external_transaction_id: String },

    /// Target account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// Charge would drive the balance negative
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    /// The account lock (or a pooled connection) could not be obtained in
    /// time. Safe to resubmit with the same external transaction id.
    #[error("Account is busy: {0}")]
    LockTimeout(String),

    /// Invalid amount (zero or negative after rounding, or too large)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed request input (blank name, missing transaction id)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Underlying storage failure. Safe to resubmit with the same
    /// external transaction id.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn duplicate(external_transaction_id: impl Into<String>) -> Self {
        Self::DuplicateTransaction {
            external_transaction_id: external_transaction_id.into(),
        }
    }

    pub fn insufficient_funds(requested: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            requested,
            available,
        }
    }

    /// Check if this is a client error (the request itself is at fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds { .. } | Self::InvalidAmount(_) | Self::InvalidRequest(_)
        )
    }

    /// Check if resubmitting with the same idempotency key may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_) | Self::Storage(_))
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        LedgerError::InvalidAmount(err.to_string())
    }
}
