use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::atomic::write_atomic;
use super::error::{StorageError, StorageResult};
use super::models::{Metadata, MetadataCatalog};
use super::sanitize::SafeName;

/// The metadata catalog, persisted as one pretty-printed JSON file.
///
/// Every mutation re-reads the file, applies the change and writes the whole
/// catalog back. Mutations are serialized through `write_lock`; reads go to the
/// file directly because it is only ever replaced by rename.
pub struct MetadataStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MetadataStore {
    /// Open the catalog at `path`, writing an empty one if the file is absent.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };

        if !store.path.exists() {
            store.save(&MetadataCatalog::new())?;
            tracing::info!(path = %store.path.display(), "Initialized empty metadata catalog");
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole catalog. A missing or unreadable catalog reads as empty.
    pub fn load(&self) -> MetadataCatalog {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return MetadataCatalog::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read metadata catalog, treating as empty");
                return MetadataCatalog::new();
            }
        };

        serde_json::from_slice(&data).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Metadata catalog is corrupt, treating as empty");
            MetadataCatalog::new()
        })
    }

    /// Replace the catalog file with `catalog`.
    pub fn save(&self, catalog: &MetadataCatalog) -> StorageResult<()> {
        let mut data = serde_json::to_vec_pretty(catalog)?;
        data.push(b'\n');
        write_atomic(&self.path, &data)?;
        Ok(())
    }

    /// Run `f` against the catalog as one load-mutate-save unit. The catalog is
    /// only written back when `f` reports a change.
    pub fn update<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut MetadataCatalog) -> (bool, T),
    {
        let _guard = self.lock();
        let mut catalog = self.load();
        let (changed, result) = f(&mut catalog);
        if changed {
            self.save(&catalog)?;
        }
        Ok(result)
    }

    /// Metadata for `name`, or an empty object if there is none.
    pub fn get(&self, name: &SafeName) -> Metadata {
        self.load().remove(name.as_str()).unwrap_or_default()
    }

    /// Replace the metadata for `name`. `record` must be a JSON object.
    pub fn set(&self, name: &SafeName, record: Value) -> StorageResult<()> {
        let Value::Object(record) = record else {
            return Err(StorageError::InvalidMetadata);
        };

        self.update(|catalog| {
            catalog.insert(name.to_string(), record);
            (true, ())
        })?;

        tracing::debug!(file = %name, "Updated metadata");
        Ok(())
    }

    /// Add an empty entry for `name` unless one already exists.
    pub fn ensure(&self, name: &SafeName) -> StorageResult<Metadata> {
        self.update(|catalog| match catalog.get(name.as_str()) {
            Some(existing) => (false, existing.clone()),
            None => {
                catalog.insert(name.to_string(), Metadata::new());
                (true, Metadata::new())
            }
        })
    }

    /// Drop the entry for `name`. Absent entries are not an error.
    pub fn remove(&self, name: &SafeName) -> StorageResult<()> {
        let removed = self.update(|catalog| {
            let removed = catalog.remove(name.as_str()).is_some();
            (removed, removed)
        })?;

        if removed {
            tracing::debug!(file = %name, "Removed metadata");
        }
        Ok(())
    }

    /// Wait for any in-flight catalog write to finish.
    pub fn close(&self) {
        let _guard = self.lock();
        tracing::debug!(path = %self.path.display(), "Metadata catalog closed");
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // Guards no data, so a poisoned lock is still usable.
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
