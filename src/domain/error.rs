//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::{Balance, PaymentStatus};

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Insufficient balance for debit operation
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    /// Invalid amount (zero, negative, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Destination account number does not resolve to a user
    #[error("Destination account not found: {0}")]
    DestinationInvalid(String),

    /// Transfer to same account
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// Page or page size below 1
    #[error("Invalid pagination: page {page}, page size {page_size}")]
    InvalidPagination { page: i64, page_size: i64 },

    /// Status write rejected by the strict transition policy
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Payment method code not mapped to a bank
    #[error("Unsupported payment method: {0}")]
    UnsupportedPayment(String),

    /// Refunds of one deposit may not add up to more than the deposit
    #[error("Refund of {requested} exceeds refundable {refundable}")]
    RefundExceedsDeposit { requested: i64, refundable: i64 },

    /// Refund key already recorded
    #[error("Refund key already used: {0}")]
    DuplicateRefund(String),
}

impl DomainError {
    /// Create an insufficient balance error
    pub fn insufficient_balance(required: i64, available: Balance) -> Self {
        Self::InsufficientBalance {
            required,
            available: available.value(),
        }
    }

    /// Check if this is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        !self.is_conflict_error()
    }

    /// Check if this is a conflict error
    pub fn is_conflict_error(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. } | Self::DuplicateRefund(_))
    }
}
