//! Status State Machine
//!
//! Applies processor outcomes to deposits and transfers.

use std::sync::Arc;

use crate::domain::{OrderId, PaymentStatus, StatusDecision, TransitionPolicy};
use crate::ledger::{LedgerError, LedgerRecord, LedgerStore};

/// Result of applying one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Updated {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    /// Record already had the target status
    Unchanged(PaymentStatus),
    /// Fraud review pending; nothing written
    Flagged,
    Ignored,
    /// Refused by the strict policy; nothing written
    Rejected {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

#[derive(Clone)]
pub struct StatusStateMachine {
    ledger: Arc<dyn LedgerStore>,
    policy: TransitionPolicy,
}

impl StatusStateMachine {
    pub fn new(ledger: Arc<dyn LedgerStore>, policy: TransitionPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Map a processor status pair and apply it to the record behind `order_id`
    pub async fn apply_webhook(
        &self,
        order_id: &OrderId,
        transaction_status: &str,
        fraud_status: Option<&str>,
    ) -> Result<WebhookOutcome, LedgerError> {
        let decision = StatusDecision::from_gateway(transaction_status, fraud_status);
        self.apply(order_id, decision).await
    }

    pub async fn apply(
        &self,
        order_id: &OrderId,
        decision: StatusDecision,
    ) -> Result<WebhookOutcome, LedgerError> {
        // Resolve first so an unknown order id fails even for no-op statuses
        let record = self.find(order_id).await?;
        self.apply_to(&record, decision).await
    }

    /// Record a notification refers to
    pub async fn find(&self, order_id: &OrderId) -> Result<LedgerRecord, LedgerError> {
        self.ledger.find_by_order_id(order_id).await
    }

    /// Apply `decision` to an already loaded record
    pub async fn apply_to(
        &self,
        record: &LedgerRecord,
        decision: StatusDecision,
    ) -> Result<WebhookOutcome, LedgerError> {
        let order_id = record.order_id();
        let current = record.status();

        // Transfers are booked internally and never charged
        if let LedgerRecord::Transfer(_) = record {
            tracing::warn!(order_id = %order_id, ?decision, "processor status for internal transfer ignored");
            return Ok(WebhookOutcome::Ignored);
        }

        let target = match decision {
            StatusDecision::Transition(target) => target,
            StatusDecision::Flagged => {
                tracing::warn!(order_id = %order_id, "payment flagged for fraud review");
                return Ok(WebhookOutcome::Flagged);
            }
            StatusDecision::Ignored => {
                tracing::debug!(order_id = %order_id, "notification ignored");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        self.policy.check(current, target)?;

        if current == target {
            return Ok(WebhookOutcome::Unchanged(current));
        }

        self.ledger.set_status(order_id, target).await?;

        tracing::info!(
            order_id = %order_id,
            from = %current,
            to = %target,
            "record status updated"
        );

        Ok(WebhookOutcome::Updated {
            from: current,
            to: target,
        })
    }
}
