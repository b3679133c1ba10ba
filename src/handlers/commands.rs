//! Command definitions
//!
//! Commands represent intentions to change the ledger. They carry raw caller
//! input; validation happens when a handler executes them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::TransactionType;

/// Command to open a new account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    pub name: String,
}

impl CreateAccountCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Command to apply a top-up or charge to one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutateBalanceCommand {
    pub account_id: Uuid,
    pub transaction_type: TransactionType,
    /// Requested magnitude, rounded to 2 digits before use
    pub amount: Decimal,
    /// Caller-supplied idempotency key
    pub external_transaction_id: String,
}

impl MutateBalanceCommand {
    pub fn top_up(account_id: Uuid, amount: Decimal, external_transaction_id: impl Into<String>) -> Self {
        Self {
            account_id,
            transaction_type: TransactionType::TopUp,
            amount,
            external_transaction_id: external_transaction_id.into(),
        }
    }

    pub fn charge(account_id: Uuid, amount: Decimal, external_transaction_id: impl Into<String>) -> Self {
        Self {
            account_id,
            transaction_type: TransactionType::Charge,
            amount,
            external_transaction_id: external_transaction_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_command_constructors() {
        let id = Uuid::new_v4();

        let top_up = MutateBalanceCommand::top_up(id, dec!(100.00), "tx-1");
        assert_eq!(top_up.transaction_type, TransactionType::TopUp);
        assert_eq!(top_up.account_id, id);
        assert_eq!(top_up.external_transaction_id, "tx-1");

        let charge = MutateBalanceCommand::charge(id, dec!(40.00), "tx-3");
        assert_eq!(charge.transaction_type, TransactionType::Charge);
        assert_eq!(charge.amount, dec!(40.00));
    }
}
