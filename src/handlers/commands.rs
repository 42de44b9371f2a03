//! Command definitions
//!
//! Commands represent intentions to change the ledger.

use serde::{Deserialize, Serialize};

use crate::domain::{Amount, DomainError, OrderId, PaymentStatus, Role};

/// Parse a wire amount into a validated [`Amount`]
pub(crate) fn parse_amount(raw: i64) -> Result<Amount, DomainError> {
    Amount::new(raw).map_err(|e| DomainError::InvalidAmount(e.to_string()))
}

// =========================================================================
// CreateDepositCommand
// =========================================================================

/// Fund the caller's account through a bank-transfer virtual account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDepositCommand {
    pub amount: i64,
    /// Payment method code ("6" BCA, "7" BRI, "8" BNI)
    pub payment: String,
}

impl CreateDepositCommand {
    pub fn new(amount: i64, payment: impl Into<String>) -> Self {
        Self {
            amount,
            payment: payment.into(),
        }
    }
}

/// Result of a successful deposit creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositResult {
    pub id: i64,
    pub order_id: OrderId,
    pub amount: Amount,
    pub bank: String,
    pub va_account: String,
    pub status: PaymentStatus,
}

// =========================================================================
// RefundCommand
// =========================================================================

/// Refund a paid deposit through the processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundCommand {
    pub order_id: String,
    /// Defaults to the full deposit amount
    pub amount: Option<i64>,
    pub reason: String,
    pub refund_key: Option<String>,
}

impl RefundCommand {
    pub fn new(order_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            amount: None,
            reason: reason.into(),
            refund_key: None,
        }
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_refund_key(mut self, refund_key: impl Into<String>) -> Self {
        self.refund_key = Some(refund_key.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub order_id: OrderId,
    pub refund_key: String,
    pub amount: i64,
    pub status_message: String,
}

// =========================================================================
// WithdrawCommand
// =========================================================================

/// Move funds out to an external account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawCommand {
    pub amount: i64,
    pub to: String,
}

impl WithdrawCommand {
    pub fn new(amount: i64, to: impl Into<String>) -> Self {
        Self {
            amount,
            to: to.into(),
        }
    }
}

// =========================================================================
// TransferCommand
// =========================================================================

/// Move funds to another account holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub to_account: String,
    pub amount: i64,
}

impl TransferCommand {
    pub fn new(to_account: impl Into<String>, amount: i64) -> Self {
        Self {
            to_account: to_account.into(),
            amount,
        }
    }
}

// =========================================================================
// CreateUserCommand
// =========================================================================

/// Command to create a new account holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserCommand {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub telephone: String,
}

impl CreateUserCommand {
    pub fn new(username: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            role,
            first_name: String::new(),
            last_name: String::new(),
            telephone: String::new(),
        }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    pub fn with_telephone(mut self, telephone: impl Into<String>) -> Self {
        self.telephone = telephone.into();
        self
    }
}
