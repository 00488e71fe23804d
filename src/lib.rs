//! drive - A minimal file storage service with per-file JSON metadata
//!
//! This crate provides:
//! - Name sanitization that keeps every stored file a single segment under the storage root
//! - Atomic (temp file + rename) writes for file content and the metadata catalog
//! - A JSON metadata catalog with serialized load-mutate-save updates
//! - A thin REST API with multipart upload and streaming download

pub mod api;
pub mod config;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use config::Config;
use storage::StorageManager;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub storage: StorageManager,
}
