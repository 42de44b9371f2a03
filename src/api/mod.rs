//! API module
//!
//! HTTP API endpoints, middleware and the shared application state.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use crate::auth::JwtService;
use crate::balance::BalanceCalculator;
use crate::domain::TransitionPolicy;
use crate::gateway::PaymentGateway;
use crate::ledger::{LedgerStore, UserDirectory};
use crate::validator::TransferValidator;
use crate::webhook::{StatusStateMachine, WebhookProcessor, WebhookSettings};

pub use routes::{build_router, create_router};

/// Everything a request handler needs, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub users: Arc<dyn UserDirectory>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub jwt: JwtService,
    pub balance: BalanceCalculator,
    pub validator: TransferValidator,
    pub machine: StatusStateMachine,
    pub webhooks: WebhookProcessor,
}

impl AppState {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        users: Arc<dyn UserDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        jwt: JwtService,
        policy: TransitionPolicy,
        webhook_settings: WebhookSettings,
    ) -> Self {
        let balance = BalanceCalculator::new(ledger.clone(), users.clone());
        let validator = TransferValidator::new(users.clone(), balance.clone());
        let machine = StatusStateMachine::new(ledger.clone(), policy);
        let webhooks = WebhookProcessor::new(machine.clone(), gateway.clone(), webhook_settings);

        Self {
            ledger,
            users,
            gateway,
            jwt,
            balance,
            validator,
            machine,
            webhooks,
        }
    }
}
