//! selfbank Library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod auth;
pub mod balance;
pub mod domain;
pub mod gateway;
pub mod handlers;
pub mod jobs;
pub mod ledger;
pub mod validator;
pub mod webhook;

pub mod config;
pub mod db;
mod error;

pub use api::{build_router, AppState};
pub use config::Config;
pub use error::{AppError, AppResult, ErrorResponse};
pub use domain::{Amount, AmountError, Balance, DomainError, OperationContext};
pub use domain::{OrderId, PaymentStatus, Role, TransitionPolicy};
