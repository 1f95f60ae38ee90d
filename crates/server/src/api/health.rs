//! Health, queue status, and loop metrics endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use meter_core::QueuePosition;
use meter_scheduler::MetricsSnapshot;
use serde::Serialize;

use crate::state::AppState;

use super::internal;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: state.backend.clone(),
    })
}

#[derive(Serialize)]
pub struct QueueStatusResponse {
    pub length: usize,
    /// Requests past the update grace period, head first.
    pub positions: Vec<QueuePosition>,
    /// Queued ids whose metadata is missing.
    pub orphans: Vec<String>,
    pub idle_recorders: Vec<String>,
}

pub async fn queue_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueStatusResponse>, (StatusCode, String)> {
    let length = state
        .queue
        .len()
        .await
        .map_err(|e| internal("failed to read queue", e))?;
    let positions = state
        .queue
        .snapshot_positions()
        .await
        .map_err(|e| internal("failed to snapshot queue", e))?;
    let orphans = state
        .queue
        .orphans()
        .await
        .map_err(|e| internal("failed to check queue metadata", e))?;
    let idle_recorders = state
        .tracker
        .idle_workers()
        .await
        .map_err(|e| internal("failed to list recorders", e))?;

    Ok(Json(QueueStatusResponse {
        length,
        positions,
        orphans,
        idle_recorders,
    }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
