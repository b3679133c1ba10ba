//! Idempotency module
//!
//! Suppresses duplicate application of an external transaction id.

mod guard;

pub use guard::IdempotencyGuard;
