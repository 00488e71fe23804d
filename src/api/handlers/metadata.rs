use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use super::blocking;
use crate::api::response::{ApiError, AppJson, FileMessage};
use crate::storage::models::Metadata;
use crate::AppState;

pub async fn get_metadata(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Metadata>, ApiError> {
    let metadata = blocking(move || state.storage.get_metadata(&name)).await?;
    Ok(Json(metadata))
}

pub async fn set_metadata(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    AppJson(record): AppJson<Value>,
) -> Result<Json<FileMessage>, ApiError> {
    let name = blocking(move || state.storage.set_metadata(&name, record)).await?;
    Ok(FileMessage::new("metadata updated", name.into_string()))
}
