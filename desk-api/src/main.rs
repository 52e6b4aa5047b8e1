use anyhow::Result;
use desk_api::{create_app, AppState, Config};
use desk_orchestrator::db::{backup_database, create_pool, run_migrations};
use desk_orchestrator::KubectlOrchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("desk_api=debug,desk_orchestrator=debug,tower_http=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting desk-api service...");

    let config = Config::from_env();
    info!(
        "Configuration loaded: bind_addr={}, db_path={}, namespace={}",
        config.bind_addr,
        config.db_path.display(),
        config.namespace
    );

    // Backup before migrations
    let db_path = &config.db_path;
    if db_path.exists() {
        let backup_path = backup_database(db_path)?;
        info!("Database backed up to: {}", backup_path.display());
    }

    let pool = create_pool(db_path).await?;
    info!("Running database migrations...");
    run_migrations(&pool).await?;
    info!("Migrations complete");

    let orchestrator = Arc::new(KubectlOrchestrator::new(config.kubectl_settings()));
    let shutdown = CancellationToken::new();
    let state = AppState::new(
        pool,
        orchestrator,
        config.engine_settings(),
        shutdown.clone(),
    );

    let app = create_app(state)?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested, cancelling in-flight provisioning");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
