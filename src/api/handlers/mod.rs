mod admin;
mod files;
mod metadata;

use crate::api::response::ApiError;
use crate::storage::StorageError;

pub use admin::{health, sweep_metadata};
pub use files::{delete_file, download_file, list_files, upload_file};
pub use metadata::{get_metadata, set_metadata};

/// Map a StorageError to an ApiError
fn storage_error(e: StorageError) -> ApiError {
    match e {
        StorageError::InvalidName(_) => ApiError::bad_request("Invalid file name"),
        StorageError::InvalidPath(_) => ApiError::bad_request("Invalid path"),
        StorageError::InvalidMetadata => {
            ApiError::bad_request("Expected a JSON object as request body")
        }
        StorageError::NotFound(_) => ApiError::not_found("File not found"),
        StorageError::PayloadTooLarge { .. } => ApiError::payload_too_large(e.to_string()),
        StorageError::Io(_) => ApiError::internal(e.to_string()),
    }
}

/// Run a blocking storage call off the async runtime.
async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("Storage task failed: {e}")))?
        .map_err(storage_error)
}
