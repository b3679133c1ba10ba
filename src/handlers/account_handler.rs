//! Account Handler
//!
//! Opens new accounts with a zero balance.

use crate::domain::{Account, LedgerError};
use crate::store::LedgerStore;

use super::CreateAccountCommand;

/// Handler for account creation
#[derive(Debug, Clone)]
pub struct AccountHandler<S> {
    store: S,
}

impl<S: LedgerStore> AccountHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Execute the create-account command
    pub async fn execute(&self, command: CreateAccountCommand) -> Result<Account, LedgerError> {
        let account = Account::open(&command.name)?;
        let account = self.store.insert_account(&account).await?;

        tracing::info!(account_id = %account.id, "Account created");
        Ok(account)
    }
}
