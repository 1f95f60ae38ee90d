//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/metrics", get(api::metrics))
        .route("/queue", get(api::queue_status))
        .route("/job/recording", post(api::enqueue_recording))
        .route("/job/recording/{id}", delete(api::cancel_recording))
        .route("/recorder/status", post(api::recorder_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
