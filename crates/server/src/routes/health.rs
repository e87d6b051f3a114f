// crates/server/src/routes/health.rs
//! Health endpoint with admission-gate visibility.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    active_jobs: usize,
    max_concurrent: usize,
    available_slots: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_jobs: state.runner.list_active().len(),
        max_concurrent: state.runner.max_concurrent(),
        available_slots: state.runner.available_slots(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use toolhost_core::{JobRunner, RunnerConfig};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_capacity() {
        let state = Arc::new(AppState::new(Arc::new(JobRunner::new(
            RunnerConfig::default(),
        ))));
        let app = Router::new().merge(router()).with_state(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["max_concurrent"], 2);
        assert_eq!(body["available_slots"], 2);
        assert_eq!(body["active_jobs"], 0);
    }
}
