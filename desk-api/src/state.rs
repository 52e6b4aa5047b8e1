use desk_orchestrator::{
    EngineSettings, Orchestrator, ProvisioningEngine, SqliteCredentialStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub engine: ProvisioningEngine,
    pub pool: SqlitePool,
    /// Parent of every per-request token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        orchestrator: Arc<dyn Orchestrator>,
        settings: EngineSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let store = Arc::new(SqliteCredentialStore::new(pool.clone()));

        Self {
            engine: ProvisioningEngine::new(orchestrator, store, settings),
            pool,
            shutdown,
        }
    }
}
