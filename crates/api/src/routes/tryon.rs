//! Route definitions for the `/tryon` resource (PRD-22).

use axum::routing::post;
use axum::Router;

use crate::handlers::tryon;
use crate::state::AppState;

/// Routes mounted at the API root.
///
/// ```text
/// POST   /tryon    -> submit_tryon
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/tryon", post(tryon::submit_tryon))
}
