use std::io::Read;
use std::path::Path;

use serde_json::Value;

use super::error::{StorageError, StorageResult};
use super::files::{FileReader, FileStore};
use super::metadata::MetadataStore;
use super::models::{FileDescriptor, Metadata};
use super::sanitize::{sanitize, SafeName};
use crate::config::StorageConfig;

/// The storage root's files and metadata catalog behind one facade.
///
/// File content is authoritative: a failed catalog write after a successful
/// file write or delete is logged, not reported as a failure. The two stores
/// are otherwise allowed to drift (metadata without a file, a file without
/// metadata); readers treat missing metadata as `{}`.
pub struct StorageManager {
    files: FileStore,
    metadata: MetadataStore,
    catalog_name: String,
    max_upload_size: u64,
}

impl StorageManager {
    /// Open the storage root and its catalog, creating both if absent.
    pub fn open(config: &StorageConfig, max_upload_size: u64) -> StorageResult<Self> {
        let files = FileStore::open(&config.root, &config.metadata_file)?;
        let metadata = MetadataStore::open(files.root().join(&config.metadata_file))?;

        Ok(Self {
            files,
            metadata,
            catalog_name: config.metadata_file.clone(),
            max_upload_size,
        })
    }

    pub fn root(&self) -> &Path {
        self.files.root()
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Sanitize a client-supplied name. The catalog file's own name is
    /// reserved.
    pub fn safe_name(&self, raw_name: &str) -> StorageResult<SafeName> {
        let name = sanitize(raw_name)?;
        if name.as_str() == self.catalog_name {
            return Err(StorageError::InvalidName(raw_name.to_string()));
        }
        Ok(name)
    }

    // ========================================================================
    // File operations
    // ========================================================================

    /// Store `content` under the sanitized `raw_name`, replacing any existing
    /// file, and make sure a metadata entry exists for it.
    pub fn upload<R: Read>(&self, raw_name: &str, content: R) -> StorageResult<FileDescriptor> {
        let name = self.safe_name(raw_name)?;
        let stat = self.files.put(&name, content, Some(self.max_upload_size))?;

        let metadata = match self.metadata.ensure(&name) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Stored file but failed to initialize metadata");
                self.metadata.get(&name)
            }
        };

        tracing::debug!(file = %name, size = stat.size, "Uploaded file");
        Ok(FileDescriptor::new(stat, metadata))
    }

    /// All stored files with their metadata, ordered by name ignoring case.
    pub fn list(&self) -> StorageResult<Vec<FileDescriptor>> {
        let catalog = self.metadata.load();
        let mut files: Vec<FileDescriptor> = self
            .files
            .list()?
            .into_iter()
            .map(|stat| {
                let metadata = catalog.get(&stat.name).cloned().unwrap_or_default();
                FileDescriptor::new(stat, metadata)
            })
            .collect();

        files.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(files)
    }

    /// Open a stored file for streaming.
    pub fn download(&self, raw_name: &str) -> StorageResult<FileReader> {
        let name = self.safe_name(raw_name)?;
        self.files.get(&name)
    }

    /// Delete a stored file, then its metadata entry. When the file is not
    /// there the metadata entry is left alone.
    pub fn delete(&self, raw_name: &str) -> StorageResult<SafeName> {
        let name = self.safe_name(raw_name)?;
        self.files.delete(&name)?;

        if let Err(e) = self.metadata.remove(&name) {
            tracing::warn!(file = %name, error = %e, "Deleted file but failed to remove metadata");
        }

        tracing::debug!(file = %name, "Deleted file");
        Ok(name)
    }

    // ========================================================================
    // Metadata operations
    // ========================================================================

    /// Metadata for a name, `{}` if there is none. The file need not exist.
    pub fn get_metadata(&self, raw_name: &str) -> StorageResult<Metadata> {
        let name = self.safe_name(raw_name)?;
        Ok(self.metadata.get(&name))
    }

    /// Replace the metadata for a name. The file need not exist.
    pub fn set_metadata(&self, raw_name: &str, record: Value) -> StorageResult<SafeName> {
        let name = self.safe_name(raw_name)?;
        self.metadata.set(&name, record)?;
        Ok(name)
    }

    /// Remove catalog entries whose file no longer exists. Returns how many
    /// entries were removed.
    pub fn sweep_orphans(&self) -> StorageResult<usize> {
        let removed = self.metadata.update(|catalog| {
            let before = catalog.len();
            catalog.retain(|name, _| match sanitize(name) {
                Ok(safe) if safe.as_str() == name => {
                    // Keep entries we cannot check rather than guess.
                    self.files.exists(&safe).unwrap_or(true)
                }
                _ => false,
            });
            let removed = before - catalog.len();
            (removed > 0, removed)
        })?;

        if removed > 0 {
            tracing::info!(removed, "Swept orphaned metadata entries");
        }
        Ok(removed)
    }

    /// Block until any in-flight catalog write has completed.
    pub fn close(&self) {
        self.metadata.close();
    }
}
