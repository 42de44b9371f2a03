//! Deposit Handlers
//!
//! Deposit creation (ledger record + processor charge) and admin refunds.

use std::sync::Arc;

use crate::domain::{Amount, DomainError, OperationContext, OrderId, PaymentStatus};
use crate::error::AppError;
use crate::gateway::{Bank, ChargeRequest, PaymentGateway, RefundRequest};
use crate::ledger::{
    LedgerRecord, LedgerStore, NewDeposit, NewRefund, PaymentToken, SumFilter, UserDirectory,
};

use super::commands::parse_amount;
use super::{CreateDepositCommand, DepositResult, RefundCommand, RefundResult};

// =========================================================================
// CreateDepositHandler
// =========================================================================

pub struct CreateDepositHandler {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CreateDepositHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { ledger, gateway }
    }

    /// Record the deposit, then charge it. A failed charge cancels the record.
    pub async fn execute(
        &self,
        command: CreateDepositCommand,
        context: &OperationContext,
    ) -> Result<DepositResult, AppError> {
        let bank = Bank::from_payment_code(&command.payment)
            .ok_or_else(|| DomainError::UnsupportedPayment(command.payment.clone()))?;
        let amount = parse_amount(command.amount)?;

        let deposit = self
            .ledger
            .create_deposit(NewDeposit {
                user_id: context.user_id,
                amount,
            })
            .await?;

        let charge = self
            .gateway
            .charge_bank_transfer(ChargeRequest {
                order_id: deposit.order_id.clone(),
                gross_amount: amount,
                bank,
            })
            .await;

        let charge = match charge {
            Ok(charge) => charge,
            Err(e) => {
                tracing::warn!(
                    order_id = %deposit.order_id,
                    correlation_id = ?context.correlation_id,
                    "charge failed, cancelling deposit: {}",
                    e
                );
                if let Err(cancel_err) = self
                    .ledger
                    .set_status(&deposit.order_id, PaymentStatus::Cancelled)
                    .await
                {
                    tracing::error!(
                        order_id = %deposit.order_id,
                        "failed to cancel deposit after charge failure: {}",
                        cancel_err
                    );
                }
                return Err(AppError::Gateway(e));
            }
        };

        let va_account = charge.virtual_account.unwrap_or_default();
        self.ledger
            .store_payment_token(PaymentToken {
                order_id: deposit.order_id.clone(),
                token: charge.transaction_id,
                bank: bank.as_str().to_string(),
                virtual_account: va_account.clone(),
                callback_url: String::new(),
            })
            .await?;

        tracing::info!(
            order_id = %deposit.order_id,
            user_id = context.user_id,
            amount = %amount,
            bank = bank.as_str(),
            "deposit created"
        );

        Ok(DepositResult {
            id: deposit.id,
            order_id: deposit.order_id,
            amount,
            bank: bank.as_str().to_string(),
            va_account,
            status: deposit.status,
        })
    }
}

// =========================================================================
// RefundDepositHandler
// =========================================================================

pub struct RefundDepositHandler {
    ledger: Arc<dyn LedgerStore>,
    users: Arc<dyn UserDirectory>,
    gateway: Arc<dyn PaymentGateway>,
}

impl RefundDepositHandler {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        users: Arc<dyn UserDirectory>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ledger,
            users,
            gateway,
        }
    }

    /// Reserve the refund as a debit, then ask the processor. A refused
    /// refund releases the reservation.
    pub async fn execute(
        &self,
        command: RefundCommand,
        context: &OperationContext,
    ) -> Result<RefundResult, AppError> {
        if !context.role.can_refund() {
            return Err(AppError::Forbidden("refunds require the admin role".to_string()));
        }

        let order_id: OrderId = command
            .order_id
            .parse()
            .map_err(|e: crate::domain::OrderIdError| AppError::InvalidRequest(e.to_string()))?;

        let deposit = match self.ledger.find_by_order_id(&order_id).await? {
            LedgerRecord::Deposit(deposit) => deposit,
            LedgerRecord::Transfer(_) => {
                return Err(AppError::InvalidRequest(
                    "only deposits can be refunded".to_string(),
                ))
            }
        };

        if deposit.status != PaymentStatus::Paid {
            return Err(AppError::InvalidRequest(format!(
                "deposit is {}, only paid deposits can be refunded",
                deposit.status
            )));
        }

        let amount = match command.amount {
            Some(raw) => parse_amount(raw)?,
            None => {
                // Whatever is left of the deposit
                let refunded = self
                    .ledger
                    .sum_amount(SumFilter::RefundsOfDeposit {
                        order_id: order_id.clone(),
                    })
                    .await?;
                Amount::new(deposit.amount.value() - refunded).map_err(|_| {
                    DomainError::RefundExceedsDeposit {
                        requested: deposit.amount.value(),
                        refundable: 0,
                    }
                })?
            }
        };

        let owner = self.users.find_user(deposit.user_id).await?;
        let refund = self
            .ledger
            .create_refund_if_covered(NewRefund {
                user_id: owner.id,
                account_number: owner.account_number,
                order_id: order_id.clone(),
                amount,
                refund_key: command.refund_key,
            })
            .await?;

        let response = self
            .gateway
            .refund(
                &order_id,
                RefundRequest {
                    refund_key: refund.refund_key.clone(),
                    amount: amount.value(),
                    reason: command.reason,
                },
            )
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    order_id = %order_id,
                    refund_key = %refund.refund_key,
                    "refund refused, releasing reservation: {}",
                    e
                );
                self.settle(&refund.refund_key, PaymentStatus::Cancelled).await;
                return Err(AppError::Gateway(e));
            }
        };
        self.settle(&refund.refund_key, PaymentStatus::Paid).await;

        tracing::info!(
            order_id = %order_id,
            refund_key = %refund.refund_key,
            amount = %amount,
            admin_id = context.user_id,
            "deposit refunded"
        );

        Ok(RefundResult {
            order_id,
            refund_key: refund.refund_key,
            amount: amount.value(),
            status_message: response.status_message,
        })
    }

    async fn settle(&self, refund_key: &str, status: PaymentStatus) {
        if let Err(e) = self.ledger.set_refund_status(refund_key, status).await {
            tracing::error!(refund_key, %status, "failed to record refund outcome: {}", e);
        }
    }
}
