//! Ledger Store module
//!
//! Durable accounts and transactions tables behind a storage-handle seam.
//!
//! A [`LedgerStore`] hands out [`LedgerTx`] atomic scopes. Inside a scope,
//! [`LedgerTx::lock_account`] acquires an exclusive lock on one account for
//! the rest of the scope, waiting at most the given bound. Dropping a scope
//! without committing rolls back every staged write and releases its locks.
//!
//! Both implementations enforce the same storage-level constraints: balances
//! and `balance_after` are never negative, `amount` is positive, and
//! `external_transaction_id` is unique across the whole ledger. Violations
//! surface as [`StoreError`] variants so callers can classify them.

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Account, Balance, LedgerEntry, NewLedgerEntry};

pub use error::StoreError;
pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Name of the uniqueness constraint on `transactions.external_transaction_id`
pub const EXTERNAL_ID_CONSTRAINT: &str = "transactions_external_transaction_id_key";

/// Storage handle shared by the mutator and the query service.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    /// Open an atomic scope. Waits for a pooled connection up to the
    /// configured acquisition bound.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Persist a freshly opened account.
    async fn insert_account(&self, account: &Account) -> Result<Account, StoreError>;

    /// Read the last committed state of an account, without locking.
    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Committed ledger entries of an account, newest first.
    async fn list_entries(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Committed ledger entry recorded under an external transaction id.
    async fn find_entry_by_external_id(
        &self,
        external_transaction_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError>;
}

/// One atomic scope over the ledger.
#[async_trait]
pub trait LedgerTx: Send {
    /// Look up an entry by external transaction id as seen from this scope.
    async fn find_entry_by_external_id(
        &mut self,
        external_transaction_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError>;

    /// Acquire the exclusive lock on `account_id` and return its current
    /// state, or `None` if the account does not exist. Fails with
    /// [`StoreError::LockTimeout`] when the lock is not granted within
    /// `timeout`.
    async fn lock_account(
        &mut self,
        account_id: Uuid,
        timeout: Duration,
    ) -> Result<Option<Account>, StoreError>;

    /// Stage a new balance for an account locked in this scope.
    async fn update_balance(&mut self, account_id: Uuid, balance: Balance)
        -> Result<(), StoreError>;

    /// Append a ledger entry. Fails with [`StoreError::UniqueViolation`] on
    /// [`EXTERNAL_ID_CONSTRAINT`] if the external id is already recorded.
    async fn append_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;

    /// Make every staged write durable and release the scope's locks.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard every staged write and release the scope's locks.
    async fn rollback(self) -> Result<(), StoreError>;
}
