use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl HealthResponse {
    fn new(status: &str, database: Option<&str>) -> Self {
        Self {
            status: status.to_string(),
            service: "desk-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.map(str::to_string),
        }
    }
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "health"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::new("ok", None))
}

/// Readiness probe, checks the credential database
#[utoipa::path(
    get,
    path = "/health/ready",
    responses((status = 200, description = "Readiness report", body = HealthResponse)),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    Json(if db_ok {
        HealthResponse::new("ready", Some("connected"))
    } else {
        HealthResponse::new("not_ready", Some("disconnected"))
    })
}
