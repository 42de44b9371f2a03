//! Scheduled Jobs
//!
//! Background reconciliation of deposits whose notification never arrived.
//! Each run asks the processor for the current status of open deposits and
//! feeds the answer through the same state machine the webhook uses. Open
//! deposits the processor has never heard of are cancelled, so they drop out
//! of later batches.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;

use crate::domain::{PaymentStatus, StatusDecision};
use crate::gateway::{GatewayError, PaymentGateway};
use crate::ledger::{LedgerError, LedgerStore};
use crate::webhook::{StatusStateMachine, WebhookOutcome};

// =========================================================================
// Deposit reconciliation
// =========================================================================

/// Re-check open deposits created before `older_than`
pub async fn reconcile_open_deposits(
    ledger: &dyn LedgerStore,
    gateway: &dyn PaymentGateway,
    machine: &StatusStateMachine,
    older_than: DateTime<Utc>,
    limit: i64,
) -> Result<ReconcileReport, JobError> {
    let deposits = ledger.list_open_deposits(older_than, limit).await?;
    let mut report = ReconcileReport {
        checked: deposits.len(),
        ..Default::default()
    };

    for deposit in deposits {
        let status = match gateway.check_status(&deposit.order_id).await {
            Ok(status) => status,
            // Never charged; past the grace period nothing will ever pay it
            Err(GatewayError::Rejected { status_code, .. }) if status_code == "404" => {
                report.unknown_to_gateway += 1;
                let cancel = StatusDecision::Transition(PaymentStatus::Cancelled);
                if let Err(e) = machine.apply(&deposit.order_id, cancel).await {
                    report.errors.push(format!("{}: {}", deposit.order_id, e));
                }
                continue;
            }
            Err(e) => {
                report
                    .errors
                    .push(format!("{}: {}", deposit.order_id, e));
                continue;
            }
        };

        let decision =
            StatusDecision::from_gateway(&status.transaction_status, status.fraud_status.as_deref());
        match machine.apply(&deposit.order_id, decision).await {
            Ok(WebhookOutcome::Updated { .. }) => report.updated += 1,
            Ok(_) => {}
            Err(e) => report
                .errors
                .push(format!("{}: {}", deposit.order_id, e)),
        }
    }

    if report.updated > 0 || !report.errors.is_empty() {
        tracing::info!(
            checked = report.checked,
            updated = report.updated,
            errors = report.errors.len(),
            "Reconciled open deposits"
        );
    }

    report.completed_at = Utc::now();
    Ok(report)
}

/// Report from one reconciliation run
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub checked: usize,
    pub updated: usize,
    pub unknown_to_gateway: usize,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    pub reconcile_interval: Duration,
    /// Deposits younger than this are left to the webhook
    pub grace_period: Duration,
    pub batch_size: i64,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(300),
            grace_period: Duration::from_secs(900),
            batch_size: 100,
        }
    }
}

/// Job Scheduler - runs periodic reconciliation
pub struct JobScheduler {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    machine: StatusStateMachine,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        machine: StatusStateMachine,
        config: JobSchedulerConfig,
    ) -> Self {
        Self {
            ledger,
            gateway,
            machine,
            config,
        }
    }

    /// Start the job scheduler in the background
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.reconcile_interval.as_secs(),
            "Job scheduler started"
        );

        let mut ticker = interval(self.config.reconcile_interval);
        loop {
            ticker.tick().await;
            let report = self.run_once().await;
            for error in &report.errors {
                tracing::error!(error = %error, "Deposit reconciliation failed");
            }
        }
    }

    /// Run reconciliation once (for manual trigger or testing)
    pub async fn run_once(&self) -> ReconcileReport {
        let cutoff = Utc::now() - grace(self.config.grace_period);
        match reconcile_open_deposits(
            self.ledger.as_ref(),
            self.gateway.as_ref(),
            &self.machine,
            cutoff,
            self.config.batch_size,
        )
        .await
        {
            Ok(report) => report,
            Err(e) => ReconcileReport {
                errors: vec![e.to_string()],
                completed_at: Utc::now(),
                ..Default::default()
            },
        }
    }
}

/// Spawn the reconciliation loop
pub fn run_scheduler(
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    machine: StatusStateMachine,
    config: JobSchedulerConfig,
) -> tokio::task::JoinHandle<()> {
    JobScheduler::new(ledger, gateway, machine, config).start()
}

fn grace(period: Duration) -> chrono::Duration {
    chrono::Duration::from_std(period).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// =========================================================================
// Tests
// =========================================================================
