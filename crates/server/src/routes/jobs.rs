// crates/server/src/routes/jobs.rs
//! API routes for job submission and retrieval.
//!
//! - POST   /jobs          — submit a tool invocation, returns 202 + job id
//! - GET    /jobs          — all retained jobs (optional ?status= filter)
//! - GET    /jobs/active   — currently running jobs
//! - GET    /jobs/{id}     — full report (optional ?limit= result window)
//! - DELETE /jobs/{id}     — request cancellation

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use toolhost_core::{
    ActiveJob, CommandDescriptor, JobKind, JobReport, JobStatus, JobSummary, ResultWindow,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Normalized submission request from the calling agent.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub kind: JobKind,
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub stdin: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportParams {
    limit: Option<usize>,
}

/// POST /jobs — submit and return immediately; completion is discovered
/// by polling GET /jobs/{id}.
async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let mut command = CommandDescriptor::new(req.command).args(req.arguments);
    for (key, value) in req.environment {
        command = command.env(key, value);
    }
    if let Some(payload) = req.stdin {
        command = command.stdin(payload);
    }
    if let Some(secs) = req.timeout_seconds {
        command = command.timeout_secs(secs);
    }

    let job = state.runner.submit(req.kind, command)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: job.id,
            status: job.status,
            started_at: job.started_at,
        }),
    ))
}

/// GET /jobs — retained jobs in insertion order, optionally filtered.
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<JobSummary>>> {
    let filter = match params.status.as_deref() {
        None => None,
        Some(s) => Some(s.parse::<JobStatus>().map_err(|_| {
            ApiError::BadRequest(format!("unknown status filter: {s}"))
        })?),
    };
    Ok(Json(state.runner.list_all(filter)))
}

/// GET /jobs/active — running jobs with start times.
async fn list_active(State(state): State<Arc<AppState>>) -> Json<Vec<ActiveJob>> {
    Json(state.runner.list_active())
}

/// GET /jobs/{id} — full report; `limit` windows the derived result.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> ApiResult<Json<JobReport>> {
    let window = ResultWindow {
        limit: params.limit,
    };
    Ok(Json(state.runner.get_results(&id, window)?))
}

/// DELETE /jobs/{id} — request cancellation. Idempotent.
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.runner.cancel(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs).post(submit_job))
        .route("/jobs/active", get(list_active))
        .route("/jobs/{id}", get(get_job).delete(cancel_job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use toolhost_core::{JobRunner, RunnerConfig};
    use tower::ServiceExt;

    fn app(config: RunnerConfig) -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(Arc::new(JobRunner::new(config))));
        let app = Router::new()
            .merge(router())
            .with_state(Arc::clone(&state));
        (app, state)
    }

    fn submit_body(command: &str, args: &[&str]) -> Body {
        Body::from(
            serde_json::json!({
                "kind": "grammar_gen",
                "command": command,
                "arguments": args,
            })
            .to_string(),
        )
    }

    async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_202_and_job_completes() {
        let (app, state) = app(RunnerConfig::default());

        let response = app
            .clone()
            .oneshot(
                Request::post("/jobs")
                    .header("content-type", "application/json")
                    .body(submit_body("sh", &["-c", "printf 'case-1\\n'"]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let submitted: SubmitResponse = json_body(response.into_body()).await;
        assert_eq!(submitted.status, JobStatus::Running);

        let done = state
            .runner
            .wait(&submitted.job_id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);

        let response = app
            .oneshot(
                Request::get(format!("/jobs/{}", submitted.job_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report: serde_json::Value = json_body(response.into_body()).await;
        assert_eq!(report["status"], "completed");
        assert_eq!(report["result"]["type"], "generated_cases");
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let (app, _state) = app(RunnerConfig::default());
        let response = app
            .oneshot(Request::get("/jobs/deadbeef").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_capacity_rejection_is_429() {
        let (app, _state) = app(RunnerConfig {
            max_concurrent: 1,
            ..RunnerConfig::default()
        });

        let first = app
            .clone()
            .oneshot(
                Request::post("/jobs")
                    .header("content-type", "application/json")
                    .body(submit_body("sh", &["-c", "sleep 5"]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let second = app
            .oneshot(
                Request::post("/jobs")
                    .header("content-type", "application/json")
                    .body(submit_body("sh", &["-c", "sleep 5"]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_bad_status_filter_is_400() {
        let (app, _state) = app(RunnerConfig::default());
        let response = app
            .oneshot(
                Request::get("/jobs?status=queued")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_command_is_400() {
        let (app, _state) = app(RunnerConfig::default());
        let response = app
            .oneshot(
                Request::post("/jobs")
                    .header("content-type", "application/json")
                    .body(submit_body("", &[]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_running_job_is_204() {
        let (app, state) = app(RunnerConfig::default());
        let job = state
            .runner
            .submit(
                JobKind::ProtocolFuzz,
                CommandDescriptor::new("sh").args(["-c", "sleep 10"]),
            )
            .unwrap();

        let response = app
            .oneshot(
                Request::delete(format!("/jobs/{}", job.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let done = state
            .runner
            .wait(&job.id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_list_active_and_all() {
        let (app, state) = app(RunnerConfig::default());
        let job = state
            .runner
            .submit(
                JobKind::ProtocolFuzz,
                CommandDescriptor::new("sh").args(["-c", "sleep 2"]),
            )
            .unwrap();

        let response = app
            .clone()
            .oneshot(Request::get("/jobs/active").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let active: Vec<serde_json::Value> = json_body(response.into_body()).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["job_id"], job.id.as_str());

        let response = app
            .oneshot(Request::get("/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let all: Vec<serde_json::Value> = json_body(response.into_body()).await;
        assert_eq!(all.len(), 1);
    }
}
