//! Command Handlers module
//!
//! Handlers that orchestrate ledger writes. Each handler validates its
//! command, then drives the store through one atomic scope.

mod account_handler;
mod commands;
mod mutator;


pub use account_handler::AccountHandler;
pub use commands::*;
pub use mutator::{AccountMutator, DEFAULT_LOCK_TIMEOUT};
