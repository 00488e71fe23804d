//! Shared test helpers for drive unit tests.

use std::sync::Arc;

use crate::config::{Config, ServerConfig, StorageConfig};
use crate::storage::StorageManager;
use crate::AppState;

/// Create a test AppState backed by a temporary storage root.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let config = Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
        },
        storage: StorageConfig {
            root: temp_dir.path().join("storage").to_string_lossy().to_string(),
            ..StorageConfig::default()
        },
        max_upload_size: 1024, // 1KB for tests
    };

    let storage = StorageManager::open(&config.storage, config.max_upload_size)
        .expect("Failed to open test storage");

    Arc::new(AppState { config, storage })
}
