use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod metrics;
pub mod objects;

/// API routes served by the relay daemon, without middleware or `/metrics`.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/objects", post(objects::object_created))
        .route("/api/v1/objects/{object_id}", get(objects::get_object_job))
        .route(
            "/api/v1/objects/{object_id}/compress",
            post(objects::compress_object),
        )
        .route("/api/v1/objects/{object_id}/check", post(objects::check_object))
        .route("/api/v1/objects/{object_id}/result", get(objects::get_object_result))
        .route("/api/v1/jobs", get(objects::list_jobs))
        .with_state(state)
}
