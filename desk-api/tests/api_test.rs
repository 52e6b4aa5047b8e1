//! Integration tests for the workspace REST endpoints

mod common;

use axum::http::StatusCode;
use common::{extract_json_body, TestClient};
use desk_orchestrator::memory::Op;
use desk_orchestrator::{OrchestratorError, ResourceKind, ResourceNamer, UserId};
use serde_json::Value;

const WORKSPACE: &str = "/api/v1/workspace";

#[tokio::test]
async fn test_ensure_workspace_returns_endpoint_and_credential() {
    let client = TestClient::new().await;

    let response = client.send("POST", WORKSPACE, Some("42")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = extract_json_body(response).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["endpoint"]["host"], "workspaces.local");
    assert_eq!(body["endpoint"]["port"], 30000);
    assert_eq!(body["endpoint"]["path"], "/workspace-42/");
    assert_eq!(body["credential"].as_str().unwrap().len(), 24);
}

#[tokio::test]
async fn test_second_ensure_returns_same_workspace() {
    let client = TestClient::new().await;

    let first: Value = extract_json_body(client.send("POST", WORKSPACE, Some("42")).await).await;
    let second: Value = extract_json_body(client.send("POST", WORKSPACE, Some("42")).await).await;

    assert_eq!(first, second);
    assert_eq!(client.orchestrator.call_count(Op::CreateComputeUnit), 1);
}

#[tokio::test]
async fn test_status_follows_lifecycle() {
    let client = TestClient::new().await;

    let before: Value = extract_json_body(client.send("GET", WORKSPACE, Some("7")).await).await;
    assert_eq!(before["status"], "absent");
    assert!(before.get("endpoint").is_none());
    assert!(before.get("credential").is_none());

    let ensured: Value = extract_json_body(client.send("POST", WORKSPACE, Some("7")).await).await;

    let running: Value = extract_json_body(client.send("GET", WORKSPACE, Some("7")).await).await;
    assert_eq!(running["status"], "running");
    assert_eq!(running["credential"], ensured["credential"]);
    assert_eq!(running["endpoint"], ensured["endpoint"]);
}

#[tokio::test]
async fn test_delete_removes_every_resource() {
    let client = TestClient::new().await;
    client.send("POST", WORKSPACE, Some("42")).await;
    assert_eq!(client.orchestrator.resource_count(), 3);

    let response = client.send("DELETE", WORKSPACE, Some("42")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = extract_json_body(response).await;
    assert_eq!(body["message"], "Workspace deleted");
    assert_eq!(body["orphans"].as_array().unwrap().len(), 0);
    assert_eq!(client.orchestrator.resource_count(), 0);

    let status: Value = extract_json_body(client.send("GET", WORKSPACE, Some("42")).await).await;
    assert_eq!(status["status"], "absent");

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workspace_credentials")
        .fetch_one(&client.pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_delete_reports_orphans() {
    let client = TestClient::new().await;
    client.send("POST", WORKSPACE, Some("42")).await;
    client.orchestrator.fail_on(
        Op::DeleteComputeUnit,
        OrchestratorError::Rejected("forbidden".to_string()),
    );

    let body: Value = extract_json_body(client.send("DELETE", WORKSPACE, Some("42")).await).await;

    assert_eq!(body["message"], "Workspace partially deleted");
    assert_eq!(body["orphans"][0]["kind"], "compute unit");
    assert_eq!(body["orphans"][0]["name"], "workspace-42");
}

#[tokio::test]
async fn test_missing_user_header_is_401() {
    let client = TestClient::new().await;

    let response = client.send("POST", WORKSPACE, None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(client.orchestrator.calls().len(), 0);
}

#[tokio::test]
async fn test_invalid_user_id_is_400() {
    let client = TestClient::new().await;

    let response = client.send("POST", WORKSPACE, Some("Not_Valid")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stopped_workspace_conflicts() {
    let client = TestClient::new().await;
    client.send("POST", WORKSPACE, Some("42")).await;

    let name = ResourceNamer::default().name(&UserId::from(42));
    client.orchestrator.set_state(
        &name,
        desk_orchestrator::ComputeUnitState::Terminated,
    );

    let response = client.send("POST", WORKSPACE, Some("42")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body: Value = extract_json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("workspace-42"));
}

#[tokio::test]
async fn test_orchestrator_outage_is_503() {
    let client = TestClient::new().await;
    client.orchestrator.fail_on(
        Op::CreateRoute,
        OrchestratorError::Unavailable("connection refused".to_string()),
    );

    let response = client.send("POST", WORKSPACE, Some("42")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let name = ResourceNamer::default().name(&UserId::from(42));
    assert!(!client.orchestrator.exists(ResourceKind::ComputeUnit, &name));
    assert!(!client.orchestrator.exists(ResourceKind::NetworkService, &name));
}

#[tokio::test]
async fn test_rejected_request_is_500() {
    let client = TestClient::new().await;
    client.orchestrator.fail_on(
        Op::CreateNetworkService,
        OrchestratorError::Rejected("quota exceeded".to_string()),
    );

    let response = client.send("POST", WORKSPACE, Some("42")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(client.orchestrator.resource_count(), 0);
}

#[tokio::test]
async fn test_health_endpoints() {
    let client = TestClient::new().await;

    let health = client.send("GET", "/health", None).await;
    assert_eq!(health.status(), StatusCode::OK);
    let body: Value = extract_json_body(health).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "desk-api");

    let ready: Value = extract_json_body(client.send("GET", "/health/ready", None).await).await;
    assert_eq!(ready["status"], "ready");
    assert_eq!(ready["database"], "connected");
}

#[tokio::test]
async fn test_openapi_document_lists_workspace_path() {
    let client = TestClient::new().await;

    let response = client.send("GET", "/api-docs/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc: Value = extract_json_body(response).await;
    assert!(doc["paths"].get(WORKSPACE).is_some());
}
