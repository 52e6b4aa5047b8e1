use crate::routes::{
    health::HealthResponse,
    workspace::{EndpointView, OrphanView, TeardownResponse, WorkspaceResponse},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::health::readiness_check,
        crate::routes::workspace::ensure_workspace,
        crate::routes::workspace::workspace_status,
        crate::routes::workspace::teardown_workspace,
    ),
    components(
        schemas(
            HealthResponse,
            EndpointView,
            WorkspaceResponse,
            OrphanView,
            TeardownResponse
        )
    ),
    tags(
        (name = "workspace", description = "Per-user workspace provisioning"),
        (name = "health", description = "Service probes")
    )
)]
pub struct ApiDoc;
