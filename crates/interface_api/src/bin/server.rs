//! Insurance marketplace API server
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin marketplace-api
//!
//! API_PORT=9000 API_DATABASE_URL=postgres://... API_LOG_FORMAT=json cargo run --bin marketplace-api
//! ```
//!
//! Every `ApiConfig` field can be set as `API_<FIELD>`; see `interface_api::config`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::{Context, HealthCheckable};
use domain_billing::SimulatedGateway;
use domain_policy::LifecycleScheduler;
use domain_rules::RulesManager;
use infra_db::{
    create_pool, run_migrations, PgClaimRepository, PgCustomerRepository, PgPaymentRepository, PgPolicyRepository,
    PgProductRepository, PgQuoteRepository, PgWorkflowRepository,
};
use infra_messaging::{EventBus, JobDispatcherService, LoggingHandler};
use interface_api::{create_router, ApiConfig, AppState, Infrastructure, Repositories};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid API_* configuration")?;
    init_tracing(&config);

    tracing::info!(addr = %config.server_addr(), "Starting insurance marketplace API");

    let pool = create_pool(config.database()).await.context("connecting to database")?;
    run_migrations(&pool).await.context("running migrations")?;

    let repositories = Repositories {
        customers: Arc::new(PgCustomerRepository::new(pool.clone())),
        products: Arc::new(PgProductRepository::new(pool.clone())),
        quotes: Arc::new(PgQuoteRepository::new(pool.clone())),
        policies: Arc::new(PgPolicyRepository::new(pool.clone())),
        claims: Arc::new(PgClaimRepository::new(pool.clone())),
        workflows: Arc::new(PgWorkflowRepository::new(pool.clone())),
        payments: Arc::new(PgPaymentRepository::new(pool)),
    };

    let rules = match &config.rules_path {
        Some(path) => RulesManager::from_file(&Context::background(), path)
            .await
            .with_context(|| format!("loading business rules from {path}"))?,
        None => RulesManager::with_defaults(),
    };

    let bus = Arc::new(EventBus::new(config.event_bus()));
    bus.subscribe("event-log", Arc::new(LoggingHandler), &[])?;
    let dispatcher = Arc::new(JobDispatcherService::new(config.dispatcher()));

    let infrastructure = Infrastructure {
        publisher: bus.clone(),
        dispatcher: dispatcher.clone(),
        gateway: Arc::new(SimulatedGateway::default()),
        rules: Arc::new(rules),
        probes: vec![bus.clone() as Arc<dyn HealthCheckable>, dispatcher.clone()],
    };
    let state = AppState::new(repositories, infrastructure, config.request_timeout());

    let scheduler = config
        .scheduler_enabled
        .then(|| LifecycleScheduler::new(state.lifecycle.clone(), config.scheduler()));
    if let Some(scheduler) = &scheduler {
        scheduler.start();
    }

    let addr: SocketAddr = config.server_addr().parse().context("invalid listen address")?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    let jobs = dispatcher.shutdown().await;
    let events = bus.close().await;
    tracing::info!(
        jobs_succeeded = jobs.succeeded,
        jobs_dead_lettered = jobs.dead_lettered,
        event_queues_drained = events.drained,
        event_queues_aborted = events.aborted,
        "Server shutdown complete"
    );
    Ok(())
}

/// `RUST_LOG` takes precedence over the configured level
fn init_tracing(config: &ApiConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).init();
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
