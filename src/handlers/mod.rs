//! Command Handlers module
//!
//! Handlers that orchestrate ledger writes. Each handler validates its
//! command, consults the balance rules and records the result.

mod commands;
mod deposit_handler;
mod transfer_handler;
mod user_handler;
mod withdrawal_handler;

pub use commands::*;
pub use deposit_handler::{CreateDepositHandler, RefundDepositHandler};
pub use transfer_handler::TransferHandler;
pub use user_handler::CreateUserHandler;
pub use withdrawal_handler::WithdrawHandler;
