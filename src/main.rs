//! selfbank - digital banking backend
//!
//! Deposits through bank-transfer virtual accounts, withdrawals and internal
//! transfers. Balances are derived from the ledger on every read.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use selfbank::auth::JwtService;
use selfbank::gateway::{MidtransClient, PaymentGateway};
use selfbank::jobs::{run_scheduler, JobSchedulerConfig};
use selfbank::ledger::{LedgerStore, PgLedgerStore, PgUserDirectory, UserDirectory};
use selfbank::webhook::WebhookSettings;
use selfbank::{build_router, db, AppState, Config, TransitionPolicy};

/// Initialize tracing/logging
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "selfbank=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.json_logs());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(environment = %config.environment, "Starting selfbank server");
    tracing::info!("Connecting to database...");

    let pool = db::connect(&config.database_url, config.database_max_connections).await?;
    db::verify_connection(&pool).await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let ledger: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(pool.clone()));
    let users: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool.clone()));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(MidtransClient::new(
        config.midtrans_base_url.clone(),
        config.midtrans_server_key.clone(),
    )?);

    let policy = TransitionPolicy::from_strict_flag(config.strict_status_transitions);
    if !config.verify_webhook_signature && !config.verify_webhook_status {
        tracing::warn!("notification bodies are trusted as-is; enable MT_VERIFY_STATUS");
    }

    let state = AppState::new(
        ledger.clone(),
        users,
        gateway.clone(),
        JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
        policy,
        WebhookSettings {
            server_key: config.midtrans_server_key.clone(),
            verify_signature: config.verify_webhook_signature,
            verify_status: config.verify_webhook_status,
        },
    );

    let scheduler = config.reconcile_interval.map(|interval| {
        run_scheduler(
            ledger,
            gateway,
            state.machine.clone(),
            JobSchedulerConfig {
                reconcile_interval: interval,
                ..Default::default()
            },
        )
    });

    let app = build_router(state);

    tracing::info!(?policy, "Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    if let Some(handle) = scheduler {
        handle.abort();
    }
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
