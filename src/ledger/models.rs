//! Ledger records
//!
//! Rows of the `deposits`, `withdrawals`, `transactions`, `refunds`,
//! `payment_tokens` and `users` tables as the rest of the service sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, OrderId, PaymentStatus, Role, WithdrawalStatus};

/// Deposit funded through the payment processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: i64,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub user_id: i64,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub amount: Amount,
    /// Free-form destination (external bank account)
    pub to: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub user_id: i64,
    /// Account number of the owner, used for the transfer legs of the balance
    pub account_number: String,
    pub amount: Amount,
    pub to: String,
}

/// Internal account-to-account transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: i64,
    #[serde(rename = "acc_number_from")]
    pub from_account: String,
    #[serde(rename = "acc_number_to")]
    pub to_account: String,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub user_id: i64,
    pub from_account: String,
    pub to_account: String,
    pub amount: Amount,
}

/// Money returned to the customer against a paid deposit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: i64,
    /// Deposit the refund is drawn against
    pub order_id: OrderId,
    pub user_id: i64,
    pub amount: Amount,
    pub refund_key: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefund {
    /// Owner of the deposit
    pub user_id: i64,
    pub account_number: String,
    pub order_id: OrderId,
    pub amount: Amount,
    /// Generated as `refund-{order_id}-{n}` when absent
    pub refund_key: Option<String>,
}

/// Processor-side handle of a deposit or transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentToken {
    pub order_id: OrderId,
    pub token: String,
    pub bank: String,
    pub virtual_account: String,
    pub callback_url: String,
}

/// A record addressable by order id
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerRecord {
    Deposit(Deposit),
    Transfer(Transfer),
}

impl LedgerRecord {
    pub fn status(&self) -> PaymentStatus {
        match self {
            Self::Deposit(d) => d.status,
            Self::Transfer(t) => t.status,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        match self {
            Self::Deposit(d) => &d.order_id,
            Self::Transfer(t) => &t.order_id,
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            Self::Deposit(d) => d.amount,
            Self::Transfer(t) => t.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(rename = "acc_number")]
    pub account_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub telephone: String,
    #[serde(rename = "idrole")]
    pub role: Role,
    pub status: i32,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub telephone: String,
    #[serde(rename = "idrole")]
    pub role: Role,
}
