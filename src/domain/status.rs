//! Record statuses and the payment status state machine
//!
//! Deposits and transfers share one lifecycle driven by payment processor
//! notifications:
//!
//! ```text
//! Created(1) -> Pending(2) -> { Paid(5) | Denied(4) | Cancelled(3) }
//! ```
//!
//! Status codes are persisted as integers and must stay stable.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::DomainError;

/// Lifecycle status of a deposit or transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum PaymentStatus {
    Created = 1,
    Pending = 2,
    Cancelled = 3,
    Denied = 4,
    Paid = 5,
}

impl PaymentStatus {
    /// Integer code used in storage and on the wire
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Created),
            2 => Some(Self::Pending),
            3 => Some(Self::Cancelled),
            4 => Some(Self::Denied),
            5 => Some(Self::Paid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
            Self::Denied => "denied",
            Self::Paid => "paid",
        }
    }

    /// Paid, Denied and Cancelled are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Denied | Self::Cancelled)
    }

    /// Forward edges of the lifecycle graph.
    ///
    /// A Created record may jump straight to a terminal state because the
    /// processor does not always report `pending` before `settlement`.
    pub fn can_advance_to(&self, next: PaymentStatus) -> bool {
        match self {
            Self::Created => next != Self::Created,
            Self::Pending => next.is_terminal(),
            Self::Paid | Self::Denied | Self::Cancelled => false,
        }
    }

    /// Whether a deposit in this status counts toward the owner's balance
    pub fn counts_for_deposit(&self) -> bool {
        matches!(self, Self::Paid)
    }

    /// Whether a transfer in this status moves funds.
    ///
    /// Internal transfers are booked at code 1 and count immediately.
    pub fn counts_for_transfer(&self) -> bool {
        matches!(self, Self::Created)
    }

    /// Whether a refund in this status has left (or is leaving) the account.
    ///
    /// A refund is reserved at code 1 before the processor is asked and
    /// settles at Paid; a refund the processor refused is Cancelled.
    pub fn counts_for_refund(&self) -> bool {
        matches!(self, Self::Created | Self::Paid)
    }

    /// Deposits still waiting on the processor
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Created | Self::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i32> for PaymentStatus {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown payment status code {}", code))
    }
}

impl From<PaymentStatus> for i32 {
    fn from(status: PaymentStatus) -> Self {
        status.code()
    }
}

/// Withdrawal status. Only `Active` (code 1) is ever written by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum WithdrawalStatus {
    Active,
    /// Any other code found in storage; never counted
    Other(i32),
}

impl WithdrawalStatus {
    pub fn code(&self) -> i32 {
        match self {
            Self::Active => 1,
            Self::Other(code) => *code,
        }
    }

    pub fn counts_toward_balance(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl From<i32> for WithdrawalStatus {
    fn from(code: i32) -> Self {
        match code {
            1 => Self::Active,
            other => Self::Other(other),
        }
    }
}

impl From<WithdrawalStatus> for i32 {
    fn from(status: WithdrawalStatus) -> Self {
        status.code()
    }
}

/// How status writes are checked against the lifecycle graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Overwrite unconditionally (a late `cancel` can move Paid back to
    /// Cancelled). This is the historical behaviour of the service.
    #[default]
    Permissive,
    /// Only forward moves along the graph; rewriting the current status is
    /// accepted as a no-op.
    Strict,
}

impl TransitionPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Permissive
        }
    }

    /// Validate a status write
    pub fn check(&self, from: PaymentStatus, to: PaymentStatus) -> Result<(), DomainError> {
        match self {
            Self::Permissive => Ok(()),
            Self::Strict if from == to || from.can_advance_to(to) => Ok(()),
            Self::Strict => Err(DomainError::InvalidTransition { from, to }),
        }
    }
}

/// What a processor notification asks the state machine to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDecision {
    /// Move the record to this status
    Transition(PaymentStatus),
    /// `capture` with fraud status `challenge`: no status change, flag only
    Flagged,
    /// A status this service does not act on (e.g. `authorize`, `refund`)
    Ignored,
}

impl StatusDecision {
    /// Map a processor `transaction_status` / `fraud_status` pair.
    pub fn from_gateway(transaction_status: &str, fraud_status: Option<&str>) -> Self {
        match transaction_status {
            "capture" => match fraud_status {
                Some("accept") => Self::Transition(PaymentStatus::Paid),
                Some("challenge") => Self::Flagged,
                _ => Self::Ignored,
            },
            "settlement" => Self::Transition(PaymentStatus::Paid),
            "deny" => Self::Transition(PaymentStatus::Denied),
            "cancel" | "expire" => Self::Transition(PaymentStatus::Cancelled),
            "pending" => Self::Transition(PaymentStatus::Pending),
            _ => Self::Ignored,
        }
    }
}
