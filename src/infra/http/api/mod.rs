pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/render", post(handlers::submit_render))
        .route("/api/v1/status/{job_id}", get(handlers::job_status))
        .route("/api/v1/download/{job_id}", get(handlers::download_artifact))
        .route("/api/v1/healthz", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
