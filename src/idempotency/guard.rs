//! Idempotency Guard
//!
//! Decides whether an external transaction id has already been applied.
//!
//! The lookup runs inside the caller's atomic scope and only serves as an
//! early exit. The uniqueness constraint on `external_transaction_id` is what
//! actually arbitrates between concurrent callers: a collision that slips
//! past the lookup is caught when the entry is appended or committed, and
//! [`IdempotencyGuard::classify`] turns it into `DuplicateTransaction` as
//! well.

use crate::domain::{ExternalTransactionId, LedgerError};
use crate::store::{LedgerTx, StoreError, EXTERNAL_ID_CONSTRAINT};

#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyGuard;

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self
    }

    /// Check whether a ledger entry already exists for `external_id`
    pub async fn has_been_applied<T: LedgerTx>(
        &self,
        tx: &mut T,
        external_id: &ExternalTransactionId,
    ) -> Result<bool, LedgerError> {
        let existing = tx
            .find_entry_by_external_id(external_id.as_str())
            .await
            .map_err(|e| self.classify(e, external_id))?;

        Ok(existing.is_some())
    }

    /// Fail with `DuplicateTransaction` if `external_id` was already applied
    pub async fn ensure_not_applied<T: LedgerTx>(
        &self,
        tx: &mut T,
        external_id: &ExternalTransactionId,
    ) -> Result<(), LedgerError> {
        if self.has_been_applied(tx, external_id).await? {
            tracing::debug!(
                external_transaction_id = %external_id,
                "Transaction id already applied"
            );
            return Err(LedgerError::duplicate(external_id.as_str()));
        }

        Ok(())
    }

    /// Map a store failure raised while applying `external_id` to the ledger
    /// error taxonomy. A late uniqueness collision on the external id is a
    /// duplicate, not a storage failure.
    pub fn classify(&self, err: StoreError, external_id: &ExternalTransactionId) -> LedgerError {
        if err.is_unique_violation_of(EXTERNAL_ID_CONSTRAINT) {
            tracing::debug!(
                external_transaction_id = %external_id,
                "Transaction id collided on insert"
            );
            return LedgerError::duplicate(external_id.as_str());
        }

        LedgerError::from(err)
    }
}
