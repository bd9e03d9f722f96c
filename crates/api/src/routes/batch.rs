//! Route definitions for the `/batch` resource (PRD-22).

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batch;
use crate::state::AppState;

/// Routes mounted at the API root.
///
/// ```text
/// POST   /batch          -> submit_batch
/// GET    /batch/{id}     -> get_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/batch", post(batch::submit_batch))
        .route("/batch/{id}", get(batch::get_batch))
}
