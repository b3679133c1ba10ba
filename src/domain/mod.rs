//! Domain module
//!
//! Core domain types: money, accounts, ledger entries and outcomes.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;

pub use account::{Account, ExternalTransactionId, LedgerEntry, NewLedgerEntry, TransactionType};
pub use amount::{round_money, Amount, AmountError, Balance, MAX_BALANCE, MONEY_SCALE};
pub use context::OperationContext;
pub use error::LedgerError;
