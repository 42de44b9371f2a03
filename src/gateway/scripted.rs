//! Scripted gateway
//!
//! Answers charges with deterministic virtual accounts and status lookups
//! from a table the caller fills in. Used by tests and for running the
//! service without processor credentials.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::{
    ChargeRequest, ChargeResponse, GatewayError, PaymentGateway, RefundRequest, RefundResponse,
    TransactionStatus,
};
use crate::domain::OrderId;

#[derive(Debug, Default)]
pub struct ScriptedGateway {
    statuses: Mutex<HashMap<String, TransactionStatus>>,
    charges: Mutex<Vec<ChargeRequest>>,
    refunds: Mutex<Vec<(OrderId, RefundRequest)>>,
    fail_charges: AtomicBool,
    fail_refunds: AtomicBool,
    sequence: AtomicU64,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following charge fail with a rejection
    pub fn fail_charges(&self, fail: bool) {
        self.fail_charges.store(fail, Ordering::SeqCst);
    }

    /// Make every following refund fail with a rejection
    pub fn fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Set what `check_status` reports for `order_id`
    pub async fn set_status(&self, order_id: &OrderId, transaction_status: &str, fraud_status: Option<&str>) {
        let status = TransactionStatus {
            order_id: order_id.to_string(),
            transaction_status: transaction_status.to_string(),
            fraud_status: fraud_status.map(str::to_string),
            status_code: Some("200".to_string()),
            gross_amount: None,
        };
        self.statuses
            .lock()
            .await
            .insert(order_id.to_string(), status);
    }

    pub async fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().await.clone()
    }

    pub async fn refunds(&self) -> Vec<(OrderId, RefundRequest)> {
        self.refunds.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn charge_bank_transfer(
        &self,
        request: ChargeRequest,
    ) -> Result<ChargeResponse, GatewayError> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status_code: "500".to_string(),
                message: "scripted failure".to_string(),
            });
        }

        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.charges.lock().await.push(request.clone());
        self.set_status(&request.order_id, "pending", None).await;

        Ok(ChargeResponse {
            transaction_id: format!("scripted-{}", n),
            transaction_status: "pending".to_string(),
            virtual_account: Some(format!("{}{:010}", request.bank.as_str(), n)),
        })
    }

    async fn check_status(&self, order_id: &OrderId) -> Result<TransactionStatus, GatewayError> {
        self.statuses
            .lock()
            .await
            .get(order_id.as_str())
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                status_code: "404".to_string(),
                message: format!("Transaction doesn't exist: {}", order_id),
            })
    }

    async fn refund(
        &self,
        order_id: &OrderId,
        request: RefundRequest,
    ) -> Result<RefundResponse, GatewayError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status_code: "412".to_string(),
                message: "scripted refund failure".to_string(),
            });
        }

        let amount = request.amount;
        self.refunds.lock().await.push((order_id.clone(), request));

        Ok(RefundResponse {
            status_code: "200".to_string(),
            status_message: "Success, refund request is approved".to_string(),
            refund_amount: Some(amount.to_string()),
        })
    }
}
