//! Query Service
//!
//! Account lookup, ledger history and lookup by external transaction id.

use uuid::Uuid;

use crate::domain::{Account, LedgerEntry, LedgerError};
use crate::store::LedgerStore;

/// Number of entries returned when no limit is given
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// Upper bound on entries returned by one history query
pub const MAX_HISTORY_LIMIT: i64 = 1000;

/// Query Service over the last committed ledger state
#[derive(Debug, Clone)]
pub struct QueryService<S> {
    store: S,
}

impl<S: LedgerStore> QueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current committed state of an account
    pub async fn get_account(&self, account_id: Uuid) -> Result<Account, LedgerError> {
        self.store
            .find_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// Ledger entries of an account, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_HISTORY_LIMIT`] and is clamped to
    /// `1..=MAX_HISTORY_LIMIT`.
    pub async fn list_transactions(
        &self,
        account_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        // Distinguish "no such account" from "no entries yet"
        self.get_account(account_id).await?;

        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        let entries = self.store.list_entries(account_id, limit).await?;
        tracing::debug!(%account_id, count = entries.len(), "Listed ledger entries");
        Ok(entries)
    }

    /// Ledger entry recorded under `external_transaction_id`, if any
    pub async fn find_transaction(
        &self,
        external_transaction_id: &str,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        if external_transaction_id.trim().is_empty() {
            return Ok(None);
        }

        Ok(self
            .store
            .find_entry_by_external_id(external_transaction_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, Balance, ExternalTransactionId, NewLedgerEntry, TransactionType};
    use crate::store::{LedgerTx, MemoryLedgerStore};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    async fn seed_entries(store: &MemoryLedgerStore, account: &Account, count: usize) {
        let mut balance = Balance::zero();
        for i in 0..count {
            let amount = Amount::new(dec!(1)).unwrap();
            balance = balance.credit(&amount).unwrap();

            let mut tx = store.begin().await.unwrap();
            tx.lock_account(account.id, Duration::from_secs(1)).await.unwrap();
            tx.update_balance(account.id, balance).await.unwrap();
            tx.append_entry(NewLedgerEntry::new(
                account.id,
                ExternalTransactionId::new(format!("seed-{}", i)).unwrap(),
                TransactionType::TopUp,
                amount,
                balance,
            ))
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }
    }

    async fn setup() -> (MemoryLedgerStore, QueryService<MemoryLedgerStore>, Account) {
        let store = MemoryLedgerStore::new();
        let account = store
            .insert_account(&Account::open("Alice").unwrap())
            .await
            .unwrap();
        (store.clone(), QueryService::new(store), account)
    }

    #[tokio::test]
    async fn test_get_account() {
        let (_, queries, account) = setup().await;

        let found = queries.get_account(account.id).await.unwrap();
        assert_eq!(found.name, "Alice");
        assert_eq!(found.balance.to_string(), "0.00");

        let missing = Uuid::new_v4();
        assert_eq!(
            queries.get_account(missing).await,
            Err(LedgerError::AccountNotFound(missing))
        );
    }

    #[tokio::test]
    async fn test_list_transactions_newest_first_and_limited() {
        let (store, queries, account) = setup().await;
        seed_entries(&store, &account, 5).await;

        let all = queries.list_transactions(account.id, None).await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].external_transaction_id.as_str(), "seed-4");
        assert_eq!(all[4].external_transaction_id.as_str(), "seed-0");

        let two = queries.list_transactions(account.id, Some(2)).await.unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].balance_after.value(), dec!(5.00));

        // Non-positive limits are clamped up to one entry
        let one = queries.list_transactions(account.id, Some(0)).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn test_list_transactions_unknown_account() {
        let (_, queries, _) = setup().await;
        let missing = Uuid::new_v4();

        assert_eq!(
            queries.list_transactions(missing, None).await,
            Err(LedgerError::AccountNotFound(missing))
        );
    }

    #[tokio::test]
    async fn test_find_transaction() {
        let (store, queries, account) = setup().await;
        seed_entries(&store, &account, 1).await;

        let entry = queries.find_transaction("seed-0").await.unwrap().unwrap();
        assert_eq!(entry.account_id, account.id);
        assert_eq!(entry.transaction_type, TransactionType::TopUp);

        assert!(queries.find_transaction("nope").await.unwrap().is_none());
        assert!(queries.find_transaction(" seed-0").await.unwrap().is_none());
        assert!(queries.find_transaction("   ").await.unwrap().is_none());
    }
}
