//! Payment gateway
//!
//! Seam for the external payment processor: bank-transfer charges, status
//! lookups and refunds. [`MidtransClient`] talks to the Midtrans Core API;
//! [`ScriptedGateway`] answers from memory for tests and local runs.

mod midtrans;
mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, OrderId};

pub use midtrans::MidtransClient;
pub use scripted::ScriptedGateway;

/// Virtual-account banks, selected by the client's payment code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bank {
    Bca,
    Bri,
    Bni,
}

impl Bank {
    /// "6" BCA, "7" BRI, "8" BNI
    pub fn from_payment_code(code: &str) -> Option<Self> {
        match code.trim() {
            "6" => Some(Self::Bca),
            "7" => Some(Self::Bri),
            "8" => Some(Self::Bni),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bca => "bca",
            Self::Bri => "bri",
            Self::Bni => "bni",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub gross_amount: Amount,
    pub bank: Bank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeResponse {
    /// Processor-side transaction id, kept as the payment token
    pub transaction_id: String,
    pub transaction_status: String,
    /// Virtual account number for `bank`, when the processor returned one
    pub virtual_account: Option<String>,
}

/// Transaction status as reported by the processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundRequest {
    pub refund_key: String,
    pub amount: i64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundResponse {
    pub status_code: String,
    pub status_message: String,
    #[serde(default)]
    pub refund_amount: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Connection, timeout or TLS failure
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// The processor answered with a non-2xx `status_code`
    #[error("Gateway rejected request ({status_code}): {message}")]
    Rejected {
        status_code: String,
        message: String,
    },

    #[error("Unexpected gateway response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge_bank_transfer(
        &self,
        request: ChargeRequest,
    ) -> Result<ChargeResponse, GatewayError>;

    async fn check_status(&self, order_id: &OrderId) -> Result<TransactionStatus, GatewayError>;

    async fn refund(
        &self,
        order_id: &OrderId,
        request: RefundRequest,
    ) -> Result<RefundResponse, GatewayError>;
}
