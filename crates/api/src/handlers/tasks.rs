//! Handlers for the `/tasks` resource (PRD-22).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use tryon_core::types::TaskId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/tasks/{id}
///
/// Snapshot of one task: status, per-stage progress, result reference or
/// structured failure detail.
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    let record = state.store.get(task_id).await?;
    Ok(Json(DataResponse {
        data: record.snapshot(),
    }))
}

/// POST /api/v1/tasks/{id}/cancel
///
/// Request cooperative cancellation. The executor honours the request
/// between stages; in-progress stage work is never interrupted. Returns
/// 204 on success, 409 once the task is terminal.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    state.store.request_cancel(task_id).await?;
    tracing::info!(task_id = %task_id, "Task cancellation requested");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tasks/{id}/retry
///
/// Explicitly retry a failed task: attempt state is reset, stage progress
/// survives, and the task is re-enqueued. Returns 202 with the refreshed
/// snapshot, 409 when the task is not in a failed state.
pub async fn retry_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    state.submitter.retry_task(task_id).await?;
    let record = state.store.get(task_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: record.snapshot(),
        }),
    ))
}
