//! Transfer Handler
//!
//! Internal account-to-account transfers with full validation.

use std::sync::Arc;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::ledger::{LedgerStore, NewTransfer, Transfer, UserDirectory};
use crate::validator::TransferValidator;

use super::commands::parse_amount;
use super::TransferCommand;

/// Handler for internal transfers
pub struct TransferHandler {
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn LedgerStore>,
    validator: TransferValidator,
}

impl TransferHandler {
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

    /// Execute the transfer command
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<Transfer, AppError> {
        let amount = parse_amount(command.amount)?;
        let to_account = command.to_account.trim().to_string();

        let sender = self.users.find_user(context.user_id).await?;
        self.validator
            .check_transfer(&sender, &to_account, &amount)
            .await?;

        let transfer = self
            .ledger
            .create_transfer_if_covered(NewTransfer {
                user_id: sender.id,
                from_account: sender.account_number.clone(),
                to_account,
                amount,
            })
            .await?;

        tracing::info!(
            order_id = %transfer.order_id,
            from = %transfer.from_account,
            to = %transfer.to_account,
            amount = %amount,
            correlation_id = ?context.correlation_id,
            "transfer recorded"
        );

        Ok(transfer)
    }
}
