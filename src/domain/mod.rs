//! Domain module
//!
//! Core domain types and business rules shared by the ledger, the balance
//! calculator and the webhook state machine.

pub mod amount;
pub mod context;
pub mod error;
pub mod order_id;
pub mod role;
pub mod status;

pub use amount::{Amount, AmountError, Balance};
pub use context::OperationContext;
pub use error::DomainError;
pub use order_id::{OrderId, OrderIdError, OrderKind};
pub use role::Role;
pub use status::{PaymentStatus, StatusDecision, TransitionPolicy, WithdrawalStatus};
