//! Synchronization handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::sync::{RunOptions, RunStatusSnapshot};
use crate::web::dto::{
    ApiQuery, ApiResponse, ClearFailuresResponse, RunAcceptedResponse, TriggerQuery,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// POST /api/admin/sync - Run a synchronization.
///
/// Waits for the run and returns its report, or returns 202 right after the
/// conflict check when `background=true`. A run in which every processed
/// source failed is answered with 500 and the report.
pub async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<TriggerQuery>,
) -> Result<Response, ApiError> {
    let options = query.to_run_options();

    if query.background {
        let spawned = state.sync.spawn_run(options).await?;
        return Ok((
            StatusCode::ACCEPTED,
            Json(ApiResponse::new(RunAcceptedResponse::running(spawned.run_id))),
        )
            .into_response());
    }

    let report = state.sync.run(options).await?;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(ApiResponse::new(report))).into_response())
}

/// GET /api/admin/sync/status - Current run status.
pub async fn sync_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<RunStatusSnapshot>> {
    Json(ApiResponse::new(state.sync.status().await))
}

/// POST /api/admin/sync/failures/clear - Empty the failure map.
pub async fn clear_failures(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<ClearFailuresResponse>> {
    let cleared = state.sync.clear_failures().await;
    Json(ApiResponse::new(ClearFailuresResponse { cleared }))
}

/// POST /api/cron/sync - Start a scheduled run in the background.
pub async fn cron_sync(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let spawned = state.sync.spawn_run(RunOptions::cron()).await?;
    tracing::info!(run_id = %spawned.run_id, "Cron synchronization started");

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(RunAcceptedResponse::running(spawned.run_id))),
    )
        .into_response())
}
