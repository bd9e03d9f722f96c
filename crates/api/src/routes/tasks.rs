//! Route definitions for the `/tasks` resource (PRD-22).

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Routes mounted at `/tasks`.
///
/// ```text
/// GET    /{id}            -> get_task
/// POST   /{id}/cancel     -> cancel_task
/// POST   /{id}/retry      -> retry_task
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(tasks::get_task))
        .route("/{id}/cancel", post(tasks::cancel_task))
        .route("/{id}/retry", post(tasks::retry_task))
}
