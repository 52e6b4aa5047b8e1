//! Shared helpers for desk-api integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use desk_api::AppState;
use desk_orchestrator::memory::InMemoryOrchestrator;
use desk_orchestrator::EngineSettings;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Helper to create an in-memory test database with migrations
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::migrate!("../desk-orchestrator/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// App wired to an in-memory orchestrator the test can inspect and poison
pub struct TestClient {
    pub app: Router,
    pub orchestrator: Arc<InMemoryOrchestrator>,
    pub pool: SqlitePool,
}

impl TestClient {
    pub async fn new() -> Self {
        let pool = create_test_db().await;
        let orchestrator = Arc::new(InMemoryOrchestrator::new());
        let state = AppState::new(
            pool.clone(),
            orchestrator.clone(),
            EngineSettings::default(),
            CancellationToken::new(),
        );
        let app = desk_api::create_app(state).expect("Failed to create test app");

        Self {
            app,
            orchestrator,
            pool,
        }
    }

    pub async fn send(&self, method: &str, uri: &str, user: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-desk-user", user);
        }

        let request = builder.body(Body::empty()).unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }
}

/// Helper to extract JSON body from axum response
pub async fn extract_json_body<T>(response: Response<Body>) -> T
where
    T: serde::de::DeserializeOwned,
{
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}
