//! Ledger Store Errors

use crate::domain::LedgerError;

/// Errors that can occur in the ledger store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Uniqueness constraint rejected a write
    #[error("Unique constraint violated ({}): {message}", .constraint.as_deref().unwrap_or("unknown"))]
    UniqueViolation {
        constraint: Option<String>,
        message: String,
    },

    /// Check constraint rejected a write
    #[error("Check constraint violated ({}): {message}", .constraint.as_deref().unwrap_or("unknown"))]
    CheckViolation {
        constraint: Option<String>,
        message: String,
    },

    /// Referential constraint rejected a write
    #[error("Foreign key violated: {0}")]
    ForeignKeyViolation(String),

    /// Row lock was not granted within the bound
    #[error("Lock wait timed out: {0}")]
    LockTimeout(String),

    /// Contention on the storage layer itself (pool exhausted,
    /// serialization failure, deadlock)
    #[error("Storage busy: {0}")]
    Busy(String),

    /// Stored data could not be mapped to the domain model
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Check if this error is a violation of the named unique constraint.
    /// A violation whose constraint name the backend did not report is
    /// treated as matching.
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        match self {
            StoreError::UniqueViolation { constraint, .. } => {
                constraint.as_deref().map_or(true, |c| c == name)
            }
            _ => false,
        }
    }

    /// Check if this error is contention that a retry may resolve
    pub fn is_contention(&self) -> bool {
        matches!(self, StoreError::LockTimeout(_) | StoreError::Busy(_))
    }
}

/// Contention becomes the retryable `LockTimeout`; everything else is a
/// storage failure. Callers that know the external id should go through
/// `IdempotencyGuard::classify` instead.
impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout(msg) | StoreError::Busy(msg) => LedgerError::LockTimeout(msg),
            other => LedgerError::Storage(other.to_string()),
        }
    }
}
