pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Catalog
        .route("/api/v1/templates", get(handlers::handle_list_templates))
        .route("/api/v1/models", get(handlers::handle_list_models))
        .route(
            "/api/v1/credentials/verify",
            post(handlers::handle_verify_credentials),
        )
        // Runs
        .route("/api/v1/runs", post(handlers::handle_start_run))
        .route("/api/v1/runs/current", get(handlers::handle_current_run))
        .route(
            "/api/v1/runs/current/cancel",
            post(handlers::handle_cancel_run),
        )
        .with_state(state)
}
