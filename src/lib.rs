//! wallet_ledger Library
//!
//! Account balances with an idempotent, append-only transaction ledger.
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod domain;
pub mod handlers;
pub mod idempotency;
pub mod query;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{Account, Amount, AmountError, Balance, LedgerEntry, LedgerError, OperationContext};
pub use error::{AppError, AppResult, ErrorResponse};
