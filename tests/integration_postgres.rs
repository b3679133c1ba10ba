//! PostgreSQL Ledger Store Integration Tests
//!
//! Skipped when DATABASE_URL is not set.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wallet_ledger::domain::{LedgerError, OperationContext, TransactionType};
use wallet_ledger::handlers::{AccountHandler, AccountMutator, CreateAccountCommand};
use wallet_ledger::query::QueryService;
use wallet_ledger::store::{LedgerStore, LedgerTx, PgLedgerStore};

mod common;

use common::unique_key;

struct Ledger {
    store: PgLedgerStore,
    accounts: AccountHandler<PgLedgerStore>,
    mutator: AccountMutator<PgLedgerStore>,
    queries: QueryService<PgLedgerStore>,
}

async fn ledger() -> Option<Ledger> {
    let pool = common::setup_test_db().await?;
    let store = PgLedgerStore::new(pool);

    Some(Ledger {
        accounts: AccountHandler::new(store.clone()),
        mutator: AccountMutator::new(store.clone()),
        queries: QueryService::new(store.clone()),
        store,
    })
}

#[tokio::test]
async fn test_reference_scenarios_pg() {
    let Some(ledger) = ledger().await else { return };
    let ctx = OperationContext::new();
    let tx1 = unique_key("tx-1");

    let account = ledger
        .accounts
        .execute(CreateAccountCommand::new("Alice"))
        .await
        .unwrap();
    assert_eq!(account.balance.to_string(), "0.00");

    let updated = ledger
        .mutator
        .top_up(account.id, dec!(100.00), &tx1, &ctx)
        .await
        .unwrap();
    assert_eq!(updated.balance.value(), dec!(100.00));

    let replay = ledger
        .mutator
        .top_up(account.id, dec!(100.00), &tx1, &ctx)
        .await;
    assert_eq!(replay, Err(LedgerError::duplicate(tx1.as_str())));

    let overdraft = ledger
        .mutator
        .charge(account.id, dec!(150.00), &unique_key("tx-2"), &ctx)
        .await;
    assert!(matches!(overdraft, Err(LedgerError::InsufficientFunds { .. })));

    let charged = ledger
        .mutator
        .charge(account.id, dec!(40.00), &unique_key("tx-3"), &ctx)
        .await
        .unwrap();
    assert_eq!(charged.balance.value(), dec!(60.00));

    let entries = ledger
        .queries
        .list_transactions(account.id, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].transaction_type, TransactionType::Charge);
    assert_eq!(entries[0].balance_after.value(), dec!(60.00));
    assert_eq!(entries[1].transaction_type, TransactionType::TopUp);

    let missing = Uuid::new_v4();
    assert_eq!(
        ledger.queries.get_account(missing).await,
        Err(LedgerError::AccountNotFound(missing))
    );
}

#[tokio::test]
async fn test_lock_timeout_pg() {
    let Some(ledger) = ledger().await else { return };
    let ctx = OperationContext::new();

    let account = ledger
        .accounts
        .execute(CreateAccountCommand::new("Bob"))
        .await
        .unwrap();

    let mut holder = ledger.store.begin().await.unwrap();
    holder
        .lock_account(account.id, Duration::from_secs(5))
        .await
        .unwrap();

    let impatient = ledger
        .mutator
        .clone()
        .with_lock_timeout(Duration::from_millis(100));
    let result = impatient
        .top_up(account.id, dec!(10.00), &unique_key("tx"), &ctx)
        .await;
    assert!(matches!(result, Err(LedgerError::LockTimeout(_))));

    holder.rollback().await.unwrap();
    let stored = ledger.queries.get_account(account.id).await.unwrap();
    assert_eq!(stored.balance.value(), dec!(0.00));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutations_pg() {
    let Some(ledger) = ledger().await else { return };
    let ledger = Arc::new(ledger);

    let account_id = ledger
        .accounts
        .execute(CreateAccountCommand::new("Carol"))
        .await
        .unwrap()
        .id;
    ledger
        .mutator
        .top_up(account_id, dec!(100.00), &unique_key("seed"), &OperationContext::new())
        .await
        .unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let ctx = OperationContext::new();
                if i % 2 == 0 {
                    ledger
                        .mutator
                        .top_up(account_id, dec!(10.00), &unique_key("up"), &ctx)
                        .await
                } else {
                    ledger
                        .mutator
                        .charge(account_id, dec!(5.00), &unique_key("down"), &ctx)
                        .await
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // 100 + 10 * 10 - 10 * 5
    let stored = ledger.queries.get_account(account_id).await.unwrap();
    assert_eq!(stored.balance.value(), dec!(150.00));

    let entries = ledger
        .queries
        .list_transactions(account_id, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 21);
    assert_eq!(entries[0].balance_after, stored.balance);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_key_across_accounts_pg() {
    let Some(ledger) = ledger().await else { return };
    let ledger = Arc::new(ledger);
    let key = unique_key("shared");

    let mut ids = Vec::new();
    for name in ["Dan", "Eve"] {
        let account = ledger
            .accounts
            .execute(CreateAccountCommand::new(name))
            .await
            .unwrap();
        ids.push(account.id);
    }

    let tasks: Vec<_> = ids
        .iter()
        .map(|&account_id| {
            let ledger = ledger.clone();
            let key = key.clone();
            tokio::spawn(async move {
                ledger
                    .mutator
                    .top_up(account_id, dec!(3.00), &key, &OperationContext::new())
                    .await
            })
        })
        .collect();

    let mut applied = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => applied += 1,
            Err(LedgerError::DuplicateTransaction { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(applied, 1);

    let entry = ledger.queries.find_transaction(&key).await.unwrap().unwrap();
    assert!(ids.contains(&entry.account_id));
}
