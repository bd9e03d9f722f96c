//! Route definitions, grouped by resource.

pub mod batch;
pub mod health;
pub mod tasks;
pub mod tryon;

use axum::Router;

use crate::state::AppState;

/// All `/api/v1` routes.
///
/// ```text
/// /tryon            submit single try-on task (POST)
/// /tasks/{id}        task snapshot (GET)
/// /tasks/{id}/cancel cancel task (POST)
/// /tasks/{id}/retry  retry failed task (POST)
/// /batch            submit batch (POST)
/// /batch/{id}        batch status (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(tryon::router())
        .nest("/tasks", tasks::router())
        .merge(batch::router())
}
