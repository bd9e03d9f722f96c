//! Handlers for the `/batch` resource (PRD-22).
//!
//! A batch is one model image against N garments, fanned out as N
//! independent tasks. Batch status is derived from the children on every
//! read; there is no stored aggregate that could drift.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use tryon_core::batch::BatchState;
use tryon_core::stage::TryonMode;
use tryon_core::types::{BatchId, TaskId};
use tryon_store::TaskSnapshot;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response payload for a successful batch submission.
#[derive(Debug, Serialize)]
pub struct BatchSubmitResult {
    pub batch_id: BatchId,
    pub task_ids: Vec<TaskId>,
    pub garments_count: usize,
}

/// Response payload for a batch status read.
#[derive(Debug, Serialize)]
pub struct BatchStatusResult {
    pub batch_id: BatchId,
    pub state: BatchState,
    pub tasks: Vec<TaskSnapshot>,
}

/// POST /api/v1/batch
///
/// Submit one model image against N garments. Multipart fields:
///
/// - `model_img` — the model image file (required)
/// - `garment_imgs` — one field per garment image (at least one)
/// - `mode` — `tryon` (default) or `swap-only`
///
/// Admission is all-or-nothing: on a full queue no child task is created.
/// Returns 201 immediately without waiting on any child.
pub async fn submit_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut model_bytes = None;
    let mut garment_bytes = Vec::new();
    let mut mode = TryonMode::Tryon;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "model_img" => model_bytes = Some(field.bytes().await?),
            "garment_imgs" => garment_bytes.push(field.bytes().await?),
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
    if garment_bytes.is_empty() {
        return Err(AppError::BadRequest(
            "At least one 'garment_imgs' field is required".to_string(),
        ));
    }

    // The model image is stored once and shared read-only by all children.
    let model_image = state.uploads.save_image("model", &model_bytes).await?;
    let mut garment_images = Vec::with_capacity(garment_bytes.len());
    for bytes in &garment_bytes {
        garment_images.push(state.uploads.save_image("garment", bytes).await?);
    }

    let (batch_id, task_ids) = state
        .submitter
        .submit_batch(model_image, garment_images, mode)
        .await?;

    tracing::info!(
        batch_id = %batch_id,
        garments = task_ids.len(),
        "Batch submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: BatchSubmitResult {
                batch_id,
                garments_count: task_ids.len(),
                task_ids,
            },
        }),
    ))
}

/// GET /api/v1/batch/{id}
///
/// Per-child snapshots plus the derived aggregate state.
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
) -> AppResult<impl IntoResponse> {
    let batch = state.batches.get(batch_id).await?;

    let mut tasks = Vec::with_capacity(batch.task_ids.len());
    for task_id in &batch.task_ids {
        tasks.push(state.store.get(*task_id).await?.snapshot());
    }

    let statuses: Vec<_> = tasks.iter().map(|t| t.status).collect();
    Ok(Json(DataResponse {
        data: BatchStatusResult {
            batch_id,
            state: BatchState::derive(&statuses),
            tasks,
        },
    }))
}
