use crate::{
    auth::AuthenticatedUser,
    error::{ApiError, ApiResult},
    state::AppState,
};
use axum::{extract::State, routing::post, Extension, Json, Router};
use desk_orchestrator::{Endpoint, WorkspaceStatus};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/v1/workspace",
        post(ensure_workspace)
            .get(workspace_status)
            .delete(teardown_workspace),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EndpointView {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl From<Endpoint> for EndpointView {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            host: endpoint.host,
            port: endpoint.port,
            path: endpoint.path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceResponse {
    /// One of `absent`, `stopped`, `running`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrphanView {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeardownResponse {
    pub message: String,
    /// Resources whose delete failed and may still exist
    pub orphans: Vec<OrphanView>,
}

/// Ensure the caller's workspace is running, creating it if needed
///
/// Provisioning runs in its own task so a client disconnect cannot abandon
/// it halfway through; only server shutdown cancels it.
#[utoipa::path(
    post,
    path = "/api/v1/workspace",
    responses(
        (status = 200, description = "Workspace running", body = WorkspaceResponse),
        (status = 409, description = "Workspace name taken by a stopped or settling instance"),
        (status = 503, description = "Orchestrator unavailable")
    ),
    tag = "workspace"
)]
pub async fn ensure_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let engine = state.engine.clone();
    let cancel = state.shutdown.child_token();
    let user_id = user.user_id.clone();

    let provisioned = tokio::spawn(async move { engine.ensure_running(&cancel, &user_id).await })
        .await
        .map_err(|e| ApiError::Internal(format!("Provisioning task failed: {}", e)))?
        .map_err(|e| {
            error!(user_id = %user.user_id, error = %e, "Workspace provisioning failed");
            ApiError::from(e)
        })?;

    if provisioned.created {
        info!(user_id = %user.user_id, "Workspace started");
    }

    Ok(Json(WorkspaceResponse {
        status: "running".to_string(),
        endpoint: Some(provisioned.endpoint.into()),
        credential: Some(provisioned.credential.expose().to_string()),
    }))
}

/// Report the caller's workspace status
#[utoipa::path(
    get,
    path = "/api/v1/workspace",
    responses(
        (status = 200, description = "Current workspace status", body = WorkspaceResponse),
        (status = 503, description = "Orchestrator unavailable")
    ),
    tag = "workspace"
)]
pub async fn workspace_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let cancel = state.shutdown.child_token();
    let report = state.engine.describe(&cancel, &user.user_id).await?;

    let response = match report.status {
        WorkspaceStatus::Running(endpoint) => WorkspaceResponse {
            status: "running".to_string(),
            endpoint: Some(endpoint.into()),
            credential: report.credential.map(|c| c.expose().to_string()),
        },
        other => WorkspaceResponse {
            status: other.as_str().to_string(),
            endpoint: None,
            credential: None,
        },
    };

    Ok(Json(response))
}

/// Delete every resource of the caller's workspace
#[utoipa::path(
    delete,
    path = "/api/v1/workspace",
    responses(
        (status = 200, description = "Workspace torn down", body = TeardownResponse),
        (status = 503, description = "Orchestrator unavailable")
    ),
    tag = "workspace"
)]
pub async fn teardown_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<TeardownResponse>> {
    let engine = state.engine.clone();
    let cancel = state.shutdown.child_token();
    let user_id = user.user_id.clone();

    let report = tokio::spawn(async move { engine.teardown(&cancel, &user_id).await })
        .await
        .map_err(|e| ApiError::Internal(format!("Teardown task failed: {}", e)))??;

    let orphans: Vec<OrphanView> = report
        .orphans()
        .into_iter()
        .map(|(kind, name)| OrphanView {
            kind: kind.to_string(),
            name: name.to_string(),
        })
        .collect();

    let message = if orphans.is_empty() {
        "Workspace deleted".to_string()
    } else {
        warn!(user_id = %user.user_id, count = orphans.len(), "Teardown left orphans");
        "Workspace partially deleted".to_string()
    };

    Ok(Json(TeardownResponse { message, orphans }))
}
