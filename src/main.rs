//! fedigate binary entry point

use fedigate::federation::{TracingJobHandler, spawn_workers};
use fedigate::{AppState, config};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the `logging` section
/// 3. Initialize metrics
/// 4. Initialize AppState
/// 5. Start inbox workers and relationship reconciliation
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    init_tracing(&config.logging);
    tracing::info!("Starting fedigate...");
    tracing::info!(
        domain = %config.server.domain,
        protocol = %config.server.protocol,
        "Configuration loaded"
    );
    if !config.server.protocol.eq_ignore_ascii_case("https") {
        tracing::warn!("Serving federation endpoints over plain http");
    }

    // 3. Initialize metrics
    fedigate::metrics::init_metrics();

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Start background tasks
    let workers = spawn_workers(
        state.queue.clone(),
        Arc::new(TracingJobHandler),
        config.queue.workers,
    );
    tracing::info!(workers = workers.len(), "Inbox workers spawned");
    spawn_reconcile_task(state.clone());

    // 6. Start HTTP server
    let app = fedigate::build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.base_url());

    axum::serve(listener, app).await?;

    Ok(())
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level when set.
fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("fedigate={},tower_http=debug", logging.level).into()
    });

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Spawn the relationship reconciliation task
///
/// The sets live in memory, so the first pass runs immediately to populate
/// them. With an interval of 0 only that first pass runs.
fn spawn_reconcile_task(state: AppState) {
    tokio::spawn(async move {
        let interval_secs = state.config.relationships.reconcile_interval_seconds;

        if interval_secs == 0 {
            run_reconcile(&state).await;
            return;
        }

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            run_reconcile(&state).await;
        }
    });

    tracing::info!("Relationship reconciliation task spawned");
}

async fn run_reconcile(state: &AppState) {
    tracing::info!("Rebuilding relationship index...");
    match state.rebuild_relationships().await {
        Ok(report) => tracing::info!(
            added = report.added,
            removed = report.removed,
            "Relationship index rebuilt"
        ),
        Err(error) => tracing::error!(%error, "Relationship rebuild failed"),
    }
}
