pub mod evaluations;
pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::routes::evaluations as eval;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/evaluations", post(eval::handle_run_evaluation))
        .route("/api/v1/evaluations", get(eval::handle_list_evaluations))
        .route("/api/v1/evaluations/:id", get(eval::handle_get_evaluation))
        .route("/api/v1/evaluations/:id", delete(eval::handle_delete_evaluation))
        .with_state(state)
}
