//! In-memory Ledger Store
//!
//! Per-account exclusive locks come from a table of async mutexes keyed by
//! account id; a scope holds the owned guards until it commits or is
//! dropped. Writes are staged in the scope and applied to the shared state in
//! one step at commit, where the uniqueness of external transaction ids is
//! checked again against everything committed in the meantime.
//!
//! Intended for tests and local runs. Nothing is persisted across restarts.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::domain::{Account, Balance, LedgerEntry, NewLedgerEntry};

use super::{LedgerStore, LedgerTx, StoreError, EXTERNAL_ID_CONSTRAINT};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<Uuid, Account>,
    /// Append-only, in commit order
    entries: Vec<LedgerEntry>,
    /// external_transaction_id -> index into `entries`
    by_external_id: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<LedgerState>,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    #[cfg(test)]
    fail_next_commit: std::sync::atomic::AtomicBool,
}

impl Shared {
    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("ledger state lock poisoned".to_string()))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, LedgerState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("ledger state lock poisoned".to_string()))
    }

    fn account_lock(&self, account_id: Uuid) -> Result<Arc<tokio::sync::Mutex<()>>, StoreError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Database("lock table poisoned".to_string()))?;
        Ok(locks.entry(account_id).or_default().clone())
    }
}

/// In-process ledger store with per-account mutex locking
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail as if the durability layer dropped out.
    #[cfg(test)]
    pub(crate) fn fail_next_commit(&self) {
        self.shared
            .fail_next_commit
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Total number of committed ledger entries.
    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        self.shared.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(MemoryLedgerTx {
            shared: self.shared.clone(),
            held: HashMap::new(),
            balances: HashMap::new(),
            entries: Vec::new(),
        })
    }

    async fn insert_account(&self, account: &Account) -> Result<Account, StoreError> {
        let mut state = self.shared.write_state()?;
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::UniqueViolation {
                constraint: Some("accounts_pkey".to_string()),
                message: format!("account {} already exists", account.id),
            });
        }

        state.accounts.insert(account.id, account.clone());
        Ok(account.clone())
    }

    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        let state = self.shared.read_state()?;
        Ok(state.accounts.get(&account_id).cloned())
    }

    async fn list_entries(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let state = self.shared.read_state()?;

        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.account_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_entry_by_external_id(
        &self,
        external_transaction_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let state = self.shared.read_state()?;
        Ok(state
            .by_external_id
            .get(external_transaction_id)
            .map(|&idx| state.entries[idx].clone()))
    }
}

/// Atomic scope over the in-memory ledger. Dropping it discards staged
/// writes and releases every account lock it holds.
pub struct MemoryLedgerTx {
    shared: Arc<Shared>,
    held: HashMap<Uuid, OwnedMutexGuard<()>>,
    balances: HashMap<Uuid, Balance>,
    entries: Vec<LedgerEntry>,
}

impl MemoryLedgerTx {
    fn duplicate_error(external_transaction_id: &str) -> StoreError {
        StoreError::UniqueViolation {
            constraint: Some(EXTERNAL_ID_CONSTRAINT.to_string()),
            message: format!(
                "external_transaction_id '{}' already exists",
                external_transaction_id
            ),
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn find_entry_by_external_id(
        &mut self,
        external_transaction_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        if let Some(staged) = self
            .entries
            .iter()
            .find(|e| e.external_transaction_id.as_str() == external_transaction_id)
        {
            return Ok(Some(staged.clone()));
        }

        let state = self.shared.read_state()?;
        Ok(state
            .by_external_id
            .get(external_transaction_id)
            .map(|&idx| state.entries[idx].clone()))
    }

    async fn lock_account(
        &mut self,
        account_id: Uuid,
        timeout: Duration,
    ) -> Result<Option<Account>, StoreError> {
        if !self.held.contains_key(&account_id) {
            let exists = self.shared.read_state()?.accounts.contains_key(&account_id);
            if !exists {
                return Ok(None);
            }

            let lock = self.shared.account_lock(account_id)?;
            let guard = tokio::time::timeout(timeout, lock.lock_owned())
                .await
                .map_err(|_| {
                    StoreError::LockTimeout(format!(
                        "lock on account {} not granted within {}ms",
                        account_id,
                        timeout.as_millis()
                    ))
                })?;
            self.held.insert(account_id, guard);
        }

        let account = self.shared.read_state()?.accounts.get(&account_id).cloned();
        Ok(account.map(|a| match self.balances.get(&account_id) {
            Some(staged) => a.with_balance(*staged),
            None => a,
        }))
    }

    async fn update_balance(
        &mut self,
        account_id: Uuid,
        balance: Balance,
    ) -> Result<(), StoreError> {
        if !self.held.contains_key(&account_id) {
            return Err(StoreError::Database(format!(
                "account {} is not locked in this transaction",
                account_id
            )));
        }

        self.balances.insert(account_id, balance);
        Ok(())
    }

    async fn append_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let external_id = entry.external_transaction_id.as_str().to_string();
        {
            let state = self.shared.read_state()?;
            if !state.accounts.contains_key(&entry.account_id) {
                return Err(StoreError::ForeignKeyViolation(format!(
                    "account {} does not exist",
                    entry.account_id
                )));
            }
            if state.by_external_id.contains_key(&external_id) {
                return Err(Self::duplicate_error(&external_id));
            }
        }
        if self
            .entries
            .iter()
            .any(|e| e.external_transaction_id.as_str() == external_id)
        {
            return Err(Self::duplicate_error(&external_id));
        }

        let entry = entry.persisted_at(Utc::now());
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn commit(self) -> Result<(), StoreError> {
        #[cfg(test)]
        if self
            .shared
            .fail_next_commit
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(StoreError::Database("connection lost during commit".to_string()));
        }

        let MemoryLedgerTx {
            shared,
            held,
            balances,
            entries,
        } = self;

        {
            let mut state = shared.write_state()?;

            // Another scope may have committed the same key since append.
            if let Some(dup) = entries
                .iter()
                .find(|e| state.by_external_id.contains_key(e.external_transaction_id.as_str()))
            {
                return Err(Self::duplicate_error(dup.external_transaction_id.as_str()));
            }

            for (account_id, balance) in balances {
                match state.accounts.get_mut(&account_id) {
                    Some(account) => account.balance = balance,
                    None => {
                        return Err(StoreError::ForeignKeyViolation(format!(
                            "account {} does not exist",
                            account_id
                        )))
                    }
                }
            }

            for entry in entries {
                let idx = state.entries.len();
                state
                    .by_external_id
                    .insert(entry.external_transaction_id.as_str().to_string(), idx);
                state.entries.push(entry);
            }
        }

        drop(held);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
