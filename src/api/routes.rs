use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Files
        .route("/api/files", get(handlers::list_files))
        .route(
            "/api/files",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/files/:name", delete(handlers::delete_file))
        .route("/api/files/:name/download", get(handlers::download_file))
        // Metadata
        .route(
            "/api/files/:name/metadata",
            get(handlers::get_metadata).post(handlers::set_metadata),
        )
        // Internal
        .route("/_internal/health", get(handlers::health))
        .route("/_internal/metadata/sweep", post(handlers::sweep_metadata))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
