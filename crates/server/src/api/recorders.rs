use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use meter_core::WorkerStateReport;
use serde::Serialize;
use tracing::debug;

use crate::state::AppState;

use super::internal;

#[derive(Debug, Serialize)]
pub struct StatusAck {
    /// Whether the recorder is now claimable.
    pub idle: bool,
}

/// Ingest a recorder's state report. Malformed reports get 422 naming the
/// missing field.
pub async fn recorder_status(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<WorkerStateReport>,
) -> Result<Json<StatusAck>, (StatusCode, String)> {
    let report = raw.validate().map_err(|e| {
        debug!(error = %e, "rejected recorder status");
        (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })?;

    let idle = state
        .tracker
        .report(&report)
        .await
        .map_err(|e| internal("failed to record recorder status", e))?;
    Ok(Json(StatusAck { idle }))
}
