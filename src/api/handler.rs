use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::http::header::CONTENT_TYPE;
use tracing::instrument;

use super::server::{AppState, JsonResult, RouteError};
use crate::sync::{CycleReport, Status};

/// Current formatted leaderboard, served from the cache while it is fresh
#[instrument(skip(state))]
pub async fn leaderboard(State(state): State<AppState>) -> Result<Response, RouteError> {
    let summary = state.tracker.summary().await?;

    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], summary).into_response())
}

/// Runs a check cycle now, waiting for a scheduled one to finish if it is mid-flight
#[instrument(skip(state))]
pub async fn check(State(state): State<AppState>) -> JsonResult<CycleReport> {
    let report = state.tracker.run_cycle().await;
    if !report.fetched {
        return Err(RouteError::CheckFailed(report.error.unwrap_or_default()));
    }

    Ok(Json(report))
}

pub async fn status(State(state): State<AppState>) -> Json<Status> {
    Json(state.tracker.status())
}
