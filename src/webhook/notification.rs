//! Processor notification payload

use serde::Deserialize;
use sha2::{Digest, Sha512};

use super::WebhookError;
use crate::domain::OrderId;

/// HTTP notification body. Only `order_id` is required; everything else is
/// optional because the status may be re-fetched from the processor.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub transaction_status: Option<String>,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
    #[serde(default)]
    pub signature_key: Option<String>,
}

impl Notification {
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(body)
            .map_err(|e| WebhookError::Parse(format!("Failed to parse notification: {}", e)))
    }

    /// The order id, validated as one of ours
    pub fn order_id(&self) -> Result<OrderId, WebhookError> {
        let raw = self
            .order_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| WebhookError::Parse("Order ID not found in notification".to_string()))?;

        raw.parse()
            .map_err(|e: crate::domain::OrderIdError| WebhookError::Parse(e.to_string()))
    }

    /// Check `signature_key` against SHA-512(order_id + status_code + gross_amount + server_key)
    pub fn verify_signature(&self, server_key: &str) -> bool {
        let (Some(order_id), Some(status_code), Some(gross_amount), Some(signature)) = (
            self.order_id.as_deref(),
            self.status_code.as_deref(),
            self.gross_amount.as_deref(),
            self.signature_key.as_deref(),
        ) else {
            return false;
        };

        let expected = signature_for(order_id, status_code, gross_amount, server_key);
        constant_time_eq(expected.as_bytes(), signature.to_ascii_lowercase().as_bytes())
    }
}

/// Hex SHA-512 signature the processor attaches to notifications
pub fn signature_for(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderKind;

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Notification::parse(b"not json"),
            Err(WebhookError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_order_id() {
        let notification = Notification::parse(br#"{"transaction_status":"settlement"}"#).unwrap();
        assert!(matches!(notification.order_id(), Err(WebhookError::Parse(_))));
    }

    #[test]
    fn test_order_id_must_be_ours() {
        let notification = Notification::parse(br#"{"order_id":"1234567890"}"#).unwrap();
        assert!(notification.order_id().is_err());

        let id = OrderId::generate(OrderKind::Deposit);
        let body = format!(r#"{{"order_id":"{}"}}"#, id);
        let notification = Notification::parse(body.as_bytes()).unwrap();
        assert_eq!(notification.order_id().unwrap(), id);
    }

    #[test]
    fn test_signature_roundtrip() {
        let signature = signature_for("DEP-1", "200", "1000.00", "server-key");
        assert_eq!(signature.len(), 128);

        let notification = Notification {
            order_id: Some("DEP-1".to_string()),
            transaction_status: Some("settlement".to_string()),
            fraud_status: None,
            status_code: Some("200".to_string()),
            gross_amount: Some("1000.00".to_string()),
            signature_key: Some(signature),
        };

        assert!(notification.verify_signature("server-key"));
        assert!(!notification.verify_signature("other-key"));
    }

    #[test]
    fn test_signature_missing_fields() {
        let notification = Notification::parse(br#"{"order_id":"DEP-1"}"#).unwrap();
        assert!(!notification.verify_signature("server-key"));
    }
}
