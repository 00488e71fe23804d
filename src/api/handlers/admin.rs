use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::blocking;
use crate::api::response::ApiError;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub removed: usize,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Drop metadata entries for files that no longer exist.
pub async fn sweep_metadata(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepResponse>, ApiError> {
    let removed = blocking(move || state.storage.sweep_orphans()).await?;
    Ok(Json(SweepResponse { removed }))
}
