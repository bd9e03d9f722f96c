//! Handlers for the `/tryon` resource (PRD-22).
//!
//! Submission is multipart: the gateway persists both images before the
//! core ever sees their references, satisfying the durability precondition
//! of task admission.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use tryon_core::stage::TryonMode;
use tryon_core::status::TaskStatus;
use tryon_core::types::TaskId;
use tryon_store::TaskInputs;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response payload for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// POST /api/v1/tryon
///
/// Submit a single try-on task. Multipart fields:
///
/// - `model_img` — the model image file (required)
/// - `garment_img` — the garment image file (required)
/// - `mode` — `tryon` (default) or `swap-only`
///
/// Returns 201 with the task id; poll `/tasks/{id}` for progress.
pub async fn submit_tryon(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut model_bytes = None;
    let mut garment_bytes = None;
    let mut mode = TryonMode::Tryon;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "model_img" => model_bytes = Some(field.bytes().await?),
            "garment_img" => garment_bytes = Some(field.bytes().await?),
            "mode" => {
                let raw = field.text().await?;
                mode = TryonMode::parse(&raw)
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown mode '{raw}'")))?;
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let model_bytes = model_bytes
        .ok_or_else(|| AppError::BadRequest("Missing 'model_img' field".to_string()))?;
    let garment_bytes = garment_bytes
        .ok_or_else(|| AppError::BadRequest("Missing 'garment_img' field".to_string()))?;

    // Durably store both inputs before admission.
    let model_image = state.uploads.save_image("model", &model_bytes).await?;
    let garment_image = state.uploads.save_image("garment", &garment_bytes).await?;

    let task_id = state
        .submitter
        .submit_task(
            TaskInputs {
                model_image,
                garment_image,
            },
            mode,
        )
        .await?;

    tracing::info!(task_id = %task_id, mode = mode.as_str(), "Try-on task submitted");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmitResult {
                task_id,
                status: TaskStatus::Pending,
            },
        }),
    ))
}
