//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::gateway::GatewayError;
use crate::ledger::LedgerError;
use crate::webhook::WebhookError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid notification signature")]
    InvalidSignature,

    #[error("Invalid notification: {0}")]
    WebhookParse(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Upstream errors (502)
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    // Server errors (5xx)
    #[error("Failed to process notification: {0}")]
    WebhookProcessing(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(what) => AppError::NotFound(what),
            LedgerError::Domain(e) => AppError::Domain(e),
            LedgerError::Database(e) => AppError::Database(e),
            LedgerError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Parse(msg) => AppError::WebhookParse(msg),
            WebhookError::InvalidSignature => AppError::InvalidSignature,
            // Unknown order: 5xx so the processor retries instead of dropping it
            WebhookError::Ledger(LedgerError::NotFound(what)) => {
                AppError::WebhookProcessing(format!("record not found: {}", what))
            }
            WebhookError::Ledger(e) => e.into(),
            WebhookError::Gateway(e) => AppError::Gateway(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::WebhookParse(msg) => {
                (StatusCode::BAD_REQUEST, "webhook_parse_error", Some(msg.clone()))
            }

            // 401 Unauthorized
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", Some(msg.clone()))
            }
            AppError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "invalid_signature", None)
            }

            // 403 Forbidden
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::NotFound(what) => {
                (StatusCode::NOT_FOUND, "record_not_found", Some(what.clone()))
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => match domain_err {
                DomainError::InsufficientBalance { .. } => (
                    StatusCode::BAD_REQUEST,
                    "insufficient_balance",
                    Some(domain_err.to_string()),
                ),
                DomainError::InvalidAmount(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                }
                DomainError::DestinationInvalid(account) => (
                    StatusCode::BAD_REQUEST,
                    "destination_invalid",
                    Some(account.clone()),
                ),
                DomainError::SameAccountTransfer => {
                    (StatusCode::BAD_REQUEST, "same_account_transfer", None)
                }
                DomainError::InvalidPagination { .. } => (
                    StatusCode::BAD_REQUEST,
                    "invalid_pagination",
                    Some(domain_err.to_string()),
                ),
                DomainError::UnsupportedPayment(code) => (
                    StatusCode::BAD_REQUEST,
                    "unsupported_payment",
                    Some(code.clone()),
                ),
                DomainError::InvalidTransition { .. } => (
                    StatusCode::CONFLICT,
                    "invalid_transition",
                    Some(domain_err.to_string()),
                ),
                DomainError::RefundExceedsDeposit { .. } => (
                    StatusCode::BAD_REQUEST,
                    "refund_exceeds_deposit",
                    Some(domain_err.to_string()),
                ),
                DomainError::DuplicateRefund(key) => {
                    (StatusCode::CONFLICT, "duplicate_refund", Some(key.clone()))
                }
            },

            // 502 Bad Gateway
            AppError::Gateway(e) => {
                tracing::error!("Gateway error: {}", e);
                (StatusCode::BAD_GATEWAY, "gateway_error", Some(e.to_string()))
            }

            // 500 Internal Server Error
            AppError::WebhookProcessing(msg) => {
                tracing::error!("Webhook processing error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "webhook_processing_error", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentStatus;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            status_of(DomainError::InvalidPagination { page: 0, page_size: 10 }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::NotFound("deposit 1".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                DomainError::InvalidTransition {
                    from: PaymentStatus::Paid,
                    to: PaymentStatus::Cancelled
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(GatewayError::Transport("timeout".into()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_of(AppError::InvalidSignature), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unknown_webhook_order_is_server_error() {
        let err: AppError = WebhookError::Ledger(LedgerError::not_found("DEP-x")).into();
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);

        let err: AppError = WebhookError::Parse("bad".into()).into();
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_ledger_not_found_is_404() {
        let err: AppError = LedgerError::not_found("withdrawal 9").into();
        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }
}
