//! Recording job submission and withdrawal.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use meter_core::{RecorderRequest, RequestMeta};
use tracing::info;

use crate::state::AppState;

use super::internal;

/// Queue a recording request.
///
/// Returns 202 with the stored metadata, 400 if `requestId` is blank.
pub async fn enqueue_recording(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecorderRequest>,
) -> Result<(StatusCode, Json<RequestMeta>), (StatusCode, String)> {
    if request.request_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "requestId must not be empty".to_string()));
    }

    let meta = state
        .queue
        .enqueue(request)
        .await
        .map_err(|e| internal("failed to queue request", e))?;
    info!(request_id = %meta.request_id(), "recording request queued");
    Ok((StatusCode::ACCEPTED, Json(meta)))
}

/// Withdraw a recording request. Unknown ids also return 204.
pub async fn cancel_recording(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .queue
        .cancel(&id)
        .await
        .map_err(|e| internal("failed to cancel request", e))?;
    info!(request_id = %id, "recording request cancelled");
    Ok(StatusCode::NO_CONTENT)
}
