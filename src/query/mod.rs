//! Query module
//!
//! Read-only access to committed ledger state. Queries never take account
//! locks and never open an atomic scope.

mod service;

pub use service::{QueryService, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
