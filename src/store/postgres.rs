//! PostgreSQL Ledger Store
//!
//! Row-level locking via `SELECT ... FOR UPDATE` bounded by a transaction
//! local `lock_timeout`. Constraint violations are mapped from SQLSTATE:
//!
//! | SQLSTATE | Meaning | StoreError |
//! |----------|---------|------------|
//! | `23505` | unique violation | `UniqueViolation` |
//! | `23514` | check violation | `CheckViolation` |
//! | `23503` | foreign key violation | `ForeignKeyViolation` |
//! | `55P03` | lock not available | `LockTimeout` |
//! | `57014` | statement cancelled by timeout | `LockTimeout` |
//! | `40001`, `40P01` | serialization failure, deadlock | `Busy` |
//! | n/a | pool acquisition timed out | `Busy` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    Account, Amount, Balance, ExternalTransactionId, LedgerEntry, LedgerError, NewLedgerEntry,
};

use super::{LedgerStore, LedgerTx, StoreError};

type AccountRow = (Uuid, String, Decimal, DateTime<Utc>);

type EntryRow = (Uuid, Uuid, String, String, Decimal, Decimal, DateTime<Utc>);

/// Ledger store backed by a bounded PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new PgLedgerStore over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PgLedgerTx { tx })
    }

    async fn insert_account(&self, account: &Account) -> Result<Account, StoreError> {
        let row: AccountRow = sqlx::query_as(
            r#"
            INSERT INTO accounts (id, name, balance)
            VALUES ($1, $2, $3)
            RETURNING id, name, balance, created_at
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(account.balance.value())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;

        account_from_row(row)
    }

    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, name, balance, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_account", e))?;

        row.map(account_from_row).transpose()
    }

    async fn list_entries(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, external_transaction_id, type, amount, balance_after, created_at
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_entries", e))?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn find_entry_by_external_id(
        &self,
        external_transaction_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let row: Option<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, external_transaction_id, type, amount, balance_after, created_at
            FROM transactions
            WHERE external_transaction_id = $1
            "#,
        )
        .bind(external_transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_entry_by_external_id", e))?;

        row.map(entry_from_row).transpose()
    }
}

/// Atomic scope over one pooled connection. Dropping it without commit rolls
/// back and returns the connection to the pool.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_entry_by_external_id(
        &mut self,
        external_transaction_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let row: Option<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, external_transaction_id, type, amount, balance_after, created_at
            FROM transactions
            WHERE external_transaction_id = $1
            "#,
        )
        .bind(external_transaction_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("tx_find_entry_by_external_id", e))?;

        row.map(entry_from_row).transpose()
    }

    async fn lock_account(
        &mut self,
        account_id: Uuid,
        timeout: Duration,
    ) -> Result<Option<Account>, StoreError> {
        // SET cannot take bind parameters; the value is an integer we format.
        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis().max(1));
        sqlx::query(&set_timeout)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, name, balance, created_at
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_account", e))?;

        row.map(account_from_row).transpose()
    }

    async fn update_balance(
        &mut self,
        account_id: Uuid,
        balance: Balance,
    ) -> Result<(), StoreError> {
        let rows = sqlx::query("UPDATE accounts SET balance = $2 WHERE id = $1")
            .bind(account_id)
            .bind(balance.value())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_balance", e))?
            .rows_affected();

        if rows == 0 {
            return Err(StoreError::Database(format!(
                "account {} vanished while locked",
                account_id
            )));
        }

        Ok(())
    }

    async fn append_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (
                id, account_id, external_transaction_id, type, amount, balance_after
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING created_at
            "#,
        )
        .bind(entry.id)
        .bind(entry.account_id)
        .bind(entry.external_transaction_id.as_str())
        .bind(entry.transaction_type.as_str())
        .bind(entry.amount.value())
        .bind(entry.balance_after.value())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_entry", e))?;

        Ok(entry.persisted_at(created_at))
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn account_from_row((id, name, balance, created_at): AccountRow) -> Result<Account, StoreError> {
    let balance = Balance::new(balance)
        .map_err(|e| StoreError::Corrupt(format!("account {}: {}", id, e)))?;

    Ok(Account {
        id,
        name,
        balance,
        created_at,
    })
}

fn entry_from_row(
    (id, account_id, external_id, kind, amount, balance_after, created_at): EntryRow,
) -> Result<LedgerEntry, StoreError> {
    let corrupt = |e: String| StoreError::Corrupt(format!("transaction {}: {}", id, e));

    Ok(LedgerEntry {
        id,
        account_id,
        external_transaction_id: ExternalTransactionId::new(external_id)
            .map_err(|e| corrupt(e.to_string()))?,
        transaction_type: kind.parse().map_err(|e: LedgerError| corrupt(e.to_string()))?,
        amount: Amount::new(amount).map_err(|e| corrupt(e.to_string()))?,
        balance_after: Balance::new(balance_after).map_err(|e| corrupt(e.to_string()))?,
        created_at,
    })
}

/// Classify a sqlx error for the operation that produced it
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = format!("{} failed: {}", operation, db_err.message());
            let constraint = db_err.constraint().map(str::to_string);

            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation {
                    constraint,
                    message,
                },
                Some("23514") => StoreError::CheckViolation {
                    constraint,
                    message,
                },
                Some("23503") => StoreError::ForeignKeyViolation(message),
                Some("55P03") | Some("57014") => StoreError::LockTimeout(message),
                Some("40001") | Some("40P01") => StoreError::Busy(message),
                _ => StoreError::Database(message),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Busy(format!("{}: timed out acquiring a connection", operation))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("{}: connection pool closed", operation))
        }
        other => StoreError::Database(format!("{} failed: {}", operation, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_busy() {
        let err = map_sqlx_error("begin", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Busy(_)));
        assert!(err.is_contention());
    }

    #[test]
    fn test_pool_closed_is_database_error() {
        let err = map_sqlx_error("begin", sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err = map_sqlx_error("find_account", sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(msg) if msg.contains("find_account")));
    }
}
