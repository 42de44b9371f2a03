//! Payment processor webhooks
//!
//! `POST /api/midtrans/notification` lands here. The processor retries any
//! non-2xx answer, so only malformed or forged payloads are answered with a
//! 4xx; failures on our side surface as 5xx.

mod notification;
mod state_machine;

use std::sync::Arc;

use crate::domain::{DomainError, StatusDecision};
use crate::gateway::{GatewayError, PaymentGateway};
use crate::ledger::{LedgerError, LedgerRecord};

pub use notification::{signature_for, Notification};
pub use state_machine::{StatusStateMachine, WebhookOutcome};

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("{0}")]
    Parse(String),

    #[error("Invalid notification signature")]
    InvalidSignature,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// How much of a notification to trust
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub server_key: String,
    pub verify_signature: bool,
    /// Ask the processor for the status instead of reading it from the body
    pub verify_status: bool,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            verify_signature: false,
            verify_status: true,
        }
    }
}

#[derive(Clone)]
pub struct WebhookProcessor {
    machine: StatusStateMachine,
    gateway: Arc<dyn PaymentGateway>,
    settings: WebhookSettings,
}

impl WebhookProcessor {
    pub fn new(
        machine: StatusStateMachine,
        gateway: Arc<dyn PaymentGateway>,
        settings: WebhookSettings,
    ) -> Self {
        Self {
            machine,
            gateway,
            settings,
        }
    }

    /// Parse, authenticate and apply one raw notification body
    pub async fn handle(&self, body: &[u8]) -> Result<WebhookOutcome, WebhookError> {
        let notification = Notification::parse(body)?;
        let order_id = notification.order_id()?;

        if self.settings.verify_signature && !notification.verify_signature(&self.settings.server_key) {
            tracing::warn!(order_id = %order_id, "notification signature mismatch");
            return Err(WebhookError::InvalidSignature);
        }

        // Unknown ids fail here, before the processor is asked about them
        let record = self.machine.find(&order_id).await?;

        let decision = match &record {
            LedgerRecord::Transfer(_) => StatusDecision::Ignored,
            LedgerRecord::Deposit(_) if self.settings.verify_status => {
                let status = self.gateway.check_status(&order_id).await?;
                StatusDecision::from_gateway(&status.transaction_status, status.fraud_status.as_deref())
            }
            LedgerRecord::Deposit(_) => {
                let transaction_status =
                    notification.transaction_status.as_deref().ok_or_else(|| {
                        WebhookError::Parse("transaction_status not found in notification".to_string())
                    })?;
                StatusDecision::from_gateway(transaction_status, notification.fraud_status.as_deref())
            }
        };

        tracing::debug!(order_id = %order_id, decision = ?decision, "notification received");

        match self.machine.apply_to(&record, decision).await {
            // Redelivery cannot change the answer, so acknowledge it
            Err(LedgerError::Domain(DomainError::InvalidTransition { from, to })) => {
                tracing::warn!(order_id = %order_id, %from, %to, "notification refused by transition policy");
                Ok(WebhookOutcome::Rejected { from, to })
            }
            result => Ok(result?),
        }
    }
}
