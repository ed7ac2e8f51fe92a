//! API routes for maia-web

use crate::AppState;
use crate::overview::{load_run_list, load_run_summary};
use crate::source::{SourceError, validate_id};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{Local, Utc};
use maia_report::timeline::session_timeline;
use maia_report::{
    CollapseState, MessageFilter, Report, RunListView, RunQuery, RunSummary, SessionChecks,
    TestMetrics, TimelineEntry,
};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error text of a missing test report
pub const TEST_NOT_FOUND: &str = "Test report not found";

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Maps a source failure to a response; `context` is the message for server errors.
fn source_error(err: &SourceError, context: &str) -> ApiError {
    match err {
        SourceError::InvalidId(_) => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        SourceError::NotFound { .. } => api_error(StatusCode::NOT_FOUND, TEST_NOT_FOUND),
        _ => {
            tracing::error!("{}: {}", context, err);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, context)
        }
    }
}

fn session_not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "Session not found")
}

/// Query parameters of the timeline endpoint
#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    #[serde(default)]
    pub filter: MessageFilter,
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List run ids
async fn list_runs(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    state
        .source
        .list_runs()
        .await
        .map(Json)
        .map_err(|e| source_error(&e, "Failed to read test runs"))
}

/// All reports of a run
async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Vec<Report>>, ApiError> {
    state
        .source
        .run_reports(&run_id)
        .await
        .map(Json)
        .map_err(|e| source_error(&e, &format!("Failed to read reports for run {run_id}")))
}

async fn fetch_test(state: &AppState, run_id: &str, test_id: &str) -> Result<Report, ApiError> {
    state
        .source
        .test_report(run_id, test_id)
        .await
        .map_err(|e| source_error(&e, "Failed to read test report"))
}

/// Single test report
async fn get_test(
    State(state): State<AppState>,
    Path((run_id, test_id)): Path<(String, String)>,
) -> Result<Json<Report>, ApiError> {
    fetch_test(&state, &run_id, &test_id).await.map(Json)
}

/// Filtered, date-grouped run list
///
/// The server keeps no per-user state, so groups get their default
/// collapsed flags on every request.
async fn overview(
    State(state): State<AppState>,
    Query(query): Query<RunQuery>,
) -> Result<Json<RunListView>, ApiError> {
    let mut collapse = CollapseState::new();
    load_run_list(state.source.as_ref(), &query, &mut collapse, &Local::now())
        .await
        .map(Json)
        .map_err(|e| source_error(&e, "Failed to read test runs"))
}

/// Rollup and test rows of one run
async fn run_summary(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSummary>, ApiError> {
    validate_id(&run_id).map_err(|e| source_error(&e, "Invalid run id"))?;
    Ok(Json(
        load_run_summary(state.source.as_ref(), &run_id, Utc::now()).await,
    ))
}

/// Derived metrics of one test
async fn test_metrics(
    State(state): State<AppState>,
    Path((run_id, test_id)): Path<(String, String)>,
) -> Result<Json<TestMetrics>, ApiError> {
    let report = fetch_test(&state, &run_id, &test_id).await?;
    Ok(Json(TestMetrics::from_report(&report)))
}

/// Message timeline of one session
async fn session_timeline_view(
    State(state): State<AppState>,
    Path((run_id, test_id, session_id)): Path<(String, String, String)>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelineEntry>>, ApiError> {
    let report = fetch_test(&state, &run_id, &test_id).await?;
    session_timeline(&report, &session_id, query.filter)
        .map(Json)
        .ok_or_else(session_not_found)
}

/// Assertions, validators and judge verdict of one session
async fn session_checks(
    State(state): State<AppState>,
    Path((run_id, test_id, session_id)): Path<(String, String, String)>,
) -> Result<Json<SessionChecks>, ApiError> {
    let report = fetch_test(&state, &run_id, &test_id).await?;
    report
        .session(&session_id)
        .map(|s| Json(SessionChecks::from_session(s)))
        .ok_or_else(session_not_found)
}

/// Create API routes
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Report files
        .route("/api/runs", get(list_runs))
        .route("/api/runs/{run_id}", get(get_run))
        .route("/api/runs/{run_id}/tests/{test_id}", get(get_test))
        // Derived views
        .route("/api/overview", get(overview))
        .route("/api/runs/{run_id}/summary", get(run_summary))
        .route(
            "/api/runs/{run_id}/tests/{test_id}/metrics",
            get(test_metrics),
        )
        .route(
            "/api/runs/{run_id}/tests/{test_id}/sessions/{session_id}/timeline",
            get(session_timeline_view),
        )
        .route(
            "/api/runs/{run_id}/tests/{test_id}/sessions/{session_id}/checks",
            get(session_checks),
        )
        .with_state(state)
}
