//! Account Mutator
//!
//! Applies a top-up or charge to one account inside a single atomic scope:
//!
//! 1. open the scope
//! 2. idempotency check (early exit with `DuplicateTransaction`)
//! 3. exclusive lock on the account row, bounded by the lock timeout
//! 4. compute the new balance; a charge below zero is rejected here, after
//!    the lock is held and before anything is written
//! 5. write the balance and append the ledger entry
//! 6. commit
//!
//! Any failure between 1 and 6 rolls the scope back, so a balance and its
//! ledger entry are only ever observed together.

use rust_decimal::Decimal;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::{
    Account, Amount, ExternalTransactionId, LedgerError, NewLedgerEntry, OperationContext,
    TransactionType,
};
use crate::idempotency::IdempotencyGuard;
use crate::store::{LedgerStore, LedgerTx};

use super::MutateBalanceCommand;

/// Default bound on waiting for an account lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Handler for balance mutations
#[derive(Debug, Clone)]
pub struct AccountMutator<S> {
    store: S,
    guard: IdempotencyGuard,
    lock_timeout: Duration,
}

impl<S: LedgerStore> AccountMutator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            guard: IdempotencyGuard::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Add `amount` to the account balance
    pub async fn top_up(
        &self,
        account_id: Uuid,
        amount: Decimal,
        external_transaction_id: &str,
        context: &OperationContext,
    ) -> Result<Account, LedgerError> {
        self.execute(
            MutateBalanceCommand::top_up(account_id, amount, external_transaction_id),
            context,
        )
        .await
    }

    /// Subtract `amount` from the account balance, rejecting the charge with
    /// `InsufficientFunds` if the balance would go negative
    pub async fn charge(
        &self,
        account_id: Uuid,
        amount: Decimal,
        external_transaction_id: &str,
        context: &OperationContext,
    ) -> Result<Account, LedgerError> {
        self.execute(
            MutateBalanceCommand::charge(account_id, amount, external_transaction_id),
            context,
        )
        .await
    }

    /// Execute a balance mutation command and return the updated account
    pub async fn execute(
        &self,
        command: MutateBalanceCommand,
        context: &OperationContext,
    ) -> Result<Account, LedgerError> {
        // Input is validated before the atomic scope opens
        let amount = Amount::new(command.amount)?;
        let external_id = ExternalTransactionId::new(command.external_transaction_id)?;

        let span = tracing::info_span!(
            "mutate_balance",
            account_id = %command.account_id,
            external_transaction_id = %external_id,
            kind = %command.transaction_type,
            correlation_id = ?context.correlation_id,
            client_ip = ?context.client_ip,
        );

        self.apply(command.account_id, command.transaction_type, amount, external_id)
            .instrument(span)
            .await
    }

    async fn apply(
        &self,
        account_id: Uuid,
        kind: TransactionType,
        amount: Amount,
        external_id: ExternalTransactionId,
    ) -> Result<Account, LedgerError> {
        let mut tx = self.store.begin().await?;

        match self
            .apply_in_scope(&mut tx, account_id, kind, amount, &external_id)
            .await
        {
            Ok(account) => {
                // A commit failure drops the scope, which rolls it back
                tx.commit()
                    .await
                    .map_err(|e| self.guard.classify(e, &external_id))
                    .map_err(log_rejection)?;

                tracing::info!(
                    amount = %amount,
                    balance_after = %account.balance,
                    "Balance mutation applied"
                );
                Ok(account)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback failed; scope dropped");
                }
                Err(log_rejection(err))
            }
        }
    }

    async fn apply_in_scope(
        &self,
        tx: &mut S::Tx,
        account_id: Uuid,
        kind: TransactionType,
        amount: Amount,
        external_id: &ExternalTransactionId,
    ) -> Result<Account, LedgerError> {
        self.guard.ensure_not_applied(tx, external_id).await?;

        let account = tx
            .lock_account(account_id, self.lock_timeout)
            .await
            .map_err(|e| self.guard.classify(e, external_id))?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let new_balance = match kind {
            TransactionType::TopUp => account.balance.credit(&amount)?,
            TransactionType::Charge => {
                if !account.balance.is_sufficient_for(&amount) {
                    return Err(LedgerError::insufficient_funds(
                        amount.value(),
                        account.balance.value(),
                    ));
                }
                account.balance.debit(&amount)?
            }
        };

        tx.update_balance(account_id, new_balance)
            .await
            .map_err(|e| self.guard.classify(e, external_id))?;

        tx.append_entry(NewLedgerEntry::new(
            account_id,
            external_id.clone(),
            kind,
            amount,
            new_balance,
        ))
        .await
        .map_err(|e| self.guard.classify(e, external_id))?;

        Ok(account.with_balance(new_balance))
    }
}

fn log_rejection(err: LedgerError) -> LedgerError {
    match &err {
        LedgerError::Storage(msg) => tracing::error!(error = %msg, "Balance mutation failed"),
        other if other.is_retryable() => {
            tracing::warn!(error = %other, retryable = true, "Balance mutation not applied")
        }
        other if other.is_client_error() => {
            tracing::debug!(reason = %other, "Balance mutation rejected")
        }
        other => tracing::info!(outcome = %other, "Balance mutation not applied"),
    }
    err
}
