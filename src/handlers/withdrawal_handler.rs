//! Withdrawal Handler
//!
//! Debits the caller's balance toward an external destination.

use std::sync::Arc;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::ledger::{LedgerStore, NewWithdrawal, UserDirectory, Withdrawal};
use crate::validator::TransferValidator;

use super::commands::parse_amount;
use super::WithdrawCommand;

pub struct WithdrawHandler {
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn LedgerStore>,
    validator: TransferValidator,
}

impl WithdrawHandler {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn LedgerStore>,
        validator: TransferValidator,
    ) -> Self {
        Self {
            users,
            ledger,
            validator,
        }
    }

    pub async fn execute(
        &self,
        command: WithdrawCommand,
        context: &OperationContext,
    ) -> Result<Withdrawal, AppError> {
        let amount = parse_amount(command.amount)?;
        let to = command.to.trim();
        if to.is_empty() {
            return Err(AppError::InvalidRequest("withdrawal destination is required".to_string()));
        }

        let sender = self.users.find_user(context.user_id).await?;
        self.validator.check_withdrawal(&sender, &amount).await?;

        // The store re-checks the balance under its own lock
        let withdrawal = self
            .ledger
            .create_withdrawal_if_covered(NewWithdrawal {
                user_id: sender.id,
                account_number: sender.account_number.clone(),
                amount,
                to: to.to_string(),
            })
            .await?;

        tracing::info!(
            withdrawal_id = withdrawal.id,
            user_id = sender.id,
            amount = %amount,
            "withdrawal recorded"
        );

        Ok(withdrawal)
    }
}
