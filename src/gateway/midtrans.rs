//! Midtrans Core API client

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{
    ChargeRequest, ChargeResponse, GatewayError, PaymentGateway, RefundRequest, RefundResponse,
    TransactionStatus,
};
use crate::domain::OrderId;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct VaNumber {
    bank: String,
    va_number: String,
}

/// Common envelope: Midtrans reports failures in the body, often with HTTP 200
#[derive(Debug, Deserialize)]
struct Envelope {
    status_code: String,
    #[serde(default)]
    status_message: String,
}

#[derive(Debug, Deserialize)]
struct ChargeBody {
    transaction_id: String,
    transaction_status: String,
    #[serde(default)]
    va_numbers: Vec<VaNumber>,
}

#[derive(Debug, Clone)]
pub struct MidtransClient {
    client: reqwest::Client,
    base_url: String,
    server_key: String,
}

impl MidtransClient {
    pub fn new(base_url: impl Into<String>, server_key: impl Into<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            server_key: server_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode the body, failing on a non-2xx `status_code`
    async fn send<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<R, GatewayError> {
        let response = request
            .basic_auth(&self.server_key, Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("HTTP request failed: {}", e)))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("Failed to parse response: {}", e)))?;

        let envelope: Envelope = serde_json::from_value(body.clone())
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        if !envelope.status_code.starts_with('2') {
            return Err(GatewayError::Rejected {
                status_code: envelope.status_code,
                message: envelope.status_message,
            });
        }

        serde_json::from_value(body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn charge_bank_transfer(
        &self,
        request: ChargeRequest,
    ) -> Result<ChargeResponse, GatewayError> {
        let bank = request.bank.as_str();
        let payload = json!({
            "payment_type": "bank_transfer",
            "bank_transfer": { "bank": bank },
            "transaction_details": {
                "order_id": request.order_id.as_str(),
                "gross_amount": request.gross_amount.value(),
            },
        });

        tracing::debug!(order_id = %request.order_id, bank, "charging bank transfer");

        let body: ChargeBody = self
            .send(self.client.post(self.url("/v2/charge")).json(&payload))
            .await?;

        let virtual_account = body
            .va_numbers
            .into_iter()
            .find(|va| va.bank == bank)
            .map(|va| va.va_number);

        Ok(ChargeResponse {
            transaction_id: body.transaction_id,
            transaction_status: body.transaction_status,
            virtual_account,
        })
    }

    async fn check_status(&self, order_id: &OrderId) -> Result<TransactionStatus, GatewayError> {
        self.send(
            self.client
                .get(self.url(&format!("/v2/{}/status", order_id))),
        )
        .await
    }

    async fn refund(
        &self,
        order_id: &OrderId,
        request: RefundRequest,
    ) -> Result<RefundResponse, GatewayError> {
        self.send(
            self.client
                .post(self.url(&format!("/v2/{}/refund", order_id)))
                .json(&request),
        )
        .await
    }
}
