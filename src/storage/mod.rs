mod atomic;
pub mod error;
pub mod files;
pub mod manager;
pub mod metadata;
pub mod models;
pub mod sanitize;

pub use error::{StorageError, StorageResult};
pub use files::{FileReader, FileStore};
pub use manager::StorageManager;
pub use metadata::MetadataStore;
pub use sanitize::{sanitize, SafeName};
