//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Account, LedgerEntry, LedgerError, OperationContext, TransactionType};
use crate::error::AppError;
use crate::handlers::{AccountHandler, AccountMutator, CreateAccountCommand, MutateBalanceCommand};
use crate::query::QueryService;
use crate::store::LedgerStore;

// =========================================================================
// Shared state
// =========================================================================

/// Handlers shared by every request
#[derive(Debug, Clone)]
pub struct AppState<S> {
    pub accounts: AccountHandler<S>,
    pub mutator: AccountMutator<S>,
    pub queries: QueryService<S>,
}

impl<S: LedgerStore + Clone> AppState<S> {
    /// Wire all handlers to one store, waiting at most `lock_timeout` for an
    /// account lock
    pub fn new(store: S, lock_timeout: std::time::Duration) -> Self {
        Self {
            accounts: AccountHandler::new(store.clone()),
            mutator: AccountMutator::new(store.clone()).with_lock_timeout(lock_timeout),
            queries: QueryService::new(store),
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub name: String,
}

/// Monetary input, accepted as a JSON number or a decimal string.
///
/// The raw JSON text is kept so a number is parsed from its exact digits
/// rather than through `f64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmountInput(Box<RawValue>);

impl AmountInput {
    fn to_decimal(&self) -> Result<Decimal, LedgerError> {
        let raw = self.0.get().trim();
        let text = if raw.starts_with('"') {
            serde_json::from_str::<String>(raw)
                .map_err(|e| LedgerError::InvalidAmount(e.to_string()))?
                .trim()
                .to_string()
        } else {
            raw.to_string()
        };

        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|_| LedgerError::InvalidAmount(format!("'{}' is not a decimal number", text)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MutateBalanceRequest {
    pub amount: Option<AmountInput>,
    #[serde(rename = "transactionId")]
    pub transaction_id: Option<String>,
}

impl MutateBalanceRequest {
    fn into_command(
        self,
        account_id: Uuid,
        transaction_type: TransactionType,
    ) -> Result<MutateBalanceCommand, AppError> {
        let amount = self
            .amount
            .ok_or_else(|| AppError::InvalidRequest("Amount is required".to_string()))?
            .to_decimal()?;
        let transaction_id = self
            .transaction_id
            .ok_or_else(|| AppError::InvalidRequest("Transaction ID is required".to_string()))?;

        Ok(MutateBalanceCommand {
            account_id,
            transaction_type,
            amount,
            external_transaction_id: transaction_id,
        })
    }
}

/// Account ids in paths are UUIDs; anything else names no account
fn parse_account_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::AccountNotFound(raw.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: String,
    pub balance: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            balance: account.balance.to_string(),
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub amount: String,
    pub balance_after: String,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for TransactionResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            account_id: entry.account_id,
            transaction_id: entry.external_transaction_id.as_str().to_string(),
            transaction_type: entry.transaction_type.to_string(),
            amount: entry.amount.to_string(),
            balance_after: entry.balance_after.to_string(),
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub account_id: Uuid,
    pub transactions: Vec<TransactionResponse>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router<S>() -> Router<AppState<S>>
where
    S: LedgerStore + Clone + 'static,
{
    Router::new()
        .route("/accounts", post(create_account::<S>))
        .route("/accounts/:account_id", get(get_account::<S>))
        .route("/accounts/:account_id/topup", post(top_up::<S>))
        .route("/accounts/:account_id/charge", post(charge::<S>))
        .route("/accounts/:account_id/transactions", get(list_transactions::<S>))
        .route("/transactions/:transaction_id", get(get_transaction::<S>))
}

// =========================================================================
// POST /accounts
// =========================================================================

async fn create_account<S: LedgerStore + Clone + 'static>(
    State(state): State<AppState<S>>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let account = state
        .accounts
        .execute(CreateAccountCommand::new(request.name))
        .await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

// =========================================================================
// POST /accounts/:account_id/topup, POST /accounts/:account_id/charge
// =========================================================================

async fn top_up<S: LedgerStore + Clone + 'static>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<String>,
    Json(request): Json<MutateBalanceRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let account_id = parse_account_id(&account_id)?;
    let command = request.into_command(account_id, TransactionType::TopUp)?;
    let account = state.mutator.execute(command, &context).await?;

    Ok(Json(account.into()))
}

async fn charge<S: LedgerStore + Clone + 'static>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<String>,
    Json(request): Json<MutateBalanceRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let account_id = parse_account_id(&account_id)?;
    let command = request.into_command(account_id, TransactionType::Charge)?;
    let account = state.mutator.execute(command, &context).await?;

    Ok(Json(account.into()))
}

// =========================================================================
// GET /accounts/:account_id
// =========================================================================

async fn get_account<S: LedgerStore + Clone + 'static>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<String>,
) -> Result<Json<AccountResponse>, AppError> {
    let account_id = parse_account_id(&account_id)?;
    let account = state.queries.get_account(account_id).await?;

    Ok(Json(account.into()))
}

// =========================================================================
// GET /accounts/:account_id/transactions
// =========================================================================

async fn list_transactions<S: LedgerStore + Clone + 'static>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let account_id = parse_account_id(&account_id)?;
    let entries = state
        .queries
        .list_transactions(account_id, query.limit)
        .await?;

    Ok(Json(HistoryResponse {
        account_id,
        transactions: entries.into_iter().map(Into::into).collect(),
    }))
}

// =========================================================================
// GET /transactions/:transaction_id
// =========================================================================

async fn get_transaction<S: LedgerStore + Clone + 'static>(
    State(state): State<AppState<S>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransactionResponse>, AppError> {
    let entry = state
        .queries
        .find_transaction(&transaction_id)
        .await?
        .ok_or(AppError::TransactionNotFound(transaction_id))?;

    Ok(Json(entry.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Amount;
    use rust_decimal_macros::dec;

    fn parse(json: &str) -> MutateBalanceRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_amount_accepts_numbers_and_strings() {
        let from_number = parse(r#"{"amount": 10.005, "transactionId": "tx-1"}"#);
        assert_eq!(from_number.amount.unwrap().to_decimal().unwrap(), dec!(10.005));

        let from_string = parse(r#"{"amount": " 40.00 ", "transactionId": "tx-1"}"#);
        assert_eq!(from_string.amount.unwrap().to_decimal().unwrap(), dec!(40));

        let integer = parse(r#"{"amount": 100, "transactionId": "tx-1"}"#);
        assert_eq!(integer.amount.unwrap().to_decimal().unwrap(), dec!(100));
    }

    #[test]
    fn test_number_amount_keeps_its_exact_digits() {
        let from_number = parse(r#"{"amount": 10.00499999999999999, "transactionId": "tx-1"}"#)
            .amount
            .unwrap()
            .to_decimal()
            .unwrap();
        let from_string = parse(r#"{"amount": "10.00499999999999999", "transactionId": "tx-1"}"#)
            .amount
            .unwrap()
            .to_decimal()
            .unwrap();

        assert_eq!(from_number, from_string);
        assert_eq!(Amount::new(from_number).unwrap().to_string(), "10.00");
        assert_eq!(Amount::new(from_string).unwrap().to_string(), "10.00");

        let scientific = parse(r#"{"amount": 1.5e1, "transactionId": "tx-1"}"#);
        assert_eq!(scientific.amount.unwrap().to_decimal().unwrap(), dec!(15));
    }

    #[test]
    fn test_non_uuid_account_id_is_not_found() {
        assert!(matches!(
            parse_account_id("not-a-uuid"),
            Err(AppError::AccountNotFound(raw)) if raw == "not-a-uuid"
        ));
        let id = Uuid::new_v4();
        assert_eq!(parse_account_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_unparseable_amount_is_invalid() {
        let request = parse(r#"{"amount": "ten", "transactionId": "tx-1"}"#);
        assert!(matches!(
            request.amount.unwrap().to_decimal(),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_missing_fields_are_invalid_requests() {
        let id = Uuid::new_v4();

        let no_amount = parse(r#"{"transactionId": "tx-1"}"#);
        assert!(matches!(
            no_amount.into_command(id, TransactionType::TopUp),
            Err(AppError::InvalidRequest(_))
        ));

        let no_id = parse(r#"{"amount": "1.00"}"#);
        assert!(matches!(
            no_id.into_command(id, TransactionType::Charge),
            Err(AppError::InvalidRequest(_))
        ));

        let complete = parse(r#"{"amount": "1.00", "transactionId": "tx-1"}"#)
            .into_command(id, TransactionType::Charge)
            .unwrap();
        assert_eq!(complete.transaction_type, TransactionType::Charge);
        assert_eq!(complete.external_transaction_id, "tx-1");
    }
}
