//! Transfer Validator
//!
//! Preflight checks shared by withdrawals and transfers. The store repeats
//! the balance check atomically when the debit is inserted; these checks
//! give early, specific errors before anything is written.

use std::sync::Arc;

use crate::balance::BalanceCalculator;
use crate::domain::{Amount, DomainError};
use crate::ledger::{LedgerError, User, UserDirectory};

#[derive(Clone)]
pub struct TransferValidator {
    users: Arc<dyn UserDirectory>,
    balance: BalanceCalculator,
}

impl TransferValidator {
    pub fn new(users: Arc<dyn UserDirectory>, balance: BalanceCalculator) -> Self {
        Self { users, balance }
    }

    /// True iff a user holds `account_number`
    pub async fn validate_destination(&self, account_number: &str) -> Result<bool, LedgerError> {
        let account_number = account_number.trim();
        if account_number.is_empty() {
            return Ok(false);
        }
        self.users.account_exists(account_number).await
    }

    /// True iff the current balance of `user_id` is at least `amount`
    pub async fn authorize_amount(&self, user_id: i64, amount: &Amount) -> Result<bool, LedgerError> {
        self.balance.covers(user_id, amount).await
    }

    /// Reject a withdrawal the sender cannot afford
    pub async fn check_withdrawal(&self, sender: &User, amount: &Amount) -> Result<(), LedgerError> {
        self.ensure_covered(sender, amount).await
    }

    /// Reject a transfer to self, to an unknown account or above the balance
    pub async fn check_transfer(
        &self,
        sender: &User,
        to_account: &str,
        amount: &Amount,
    ) -> Result<(), LedgerError> {
        if sender.account_number == to_account.trim() {
            return Err(DomainError::SameAccountTransfer.into());
        }

        if !self.validate_destination(to_account).await? {
            tracing::info!(
                user_id = sender.id,
                to_account,
                "transfer rejected: unknown destination"
            );
            return Err(DomainError::DestinationInvalid(to_account.to_string()).into());
        }

        self.ensure_covered(sender, amount).await
    }

    async fn ensure_covered(&self, sender: &User, amount: &Amount) -> Result<(), LedgerError> {
        let totals = self
            .balance
            .totals(sender.id, &sender.account_number)
            .await?;
        Ok(totals.ensure_covers(amount)?)
    }
}
