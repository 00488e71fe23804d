use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::instrument;

use super::atomic::PendingFile;
use super::error::{StorageError, StorageResult};
use super::models::FileStat;
use super::sanitize::SafeName;

/// File content stored directly under a single root directory.
pub struct FileStore {
    root: PathBuf,
    /// Canonical form of `root`, used for containment checks.
    root_canonical: PathBuf,
    /// File in the root that is not part of the listing (the metadata catalog).
    hidden: String,
}

/// An open file handle for streaming a stored file.
///
/// The handle is closed when the reader is dropped, whether or not it was
/// read to the end.
#[derive(Debug)]
pub struct FileReader {
    file: File,
    stat: FileStat,
}

impl FileReader {
    pub fn stat(&self) -> &FileStat {
        &self.stat
    }

    /// Hand the underlying handle to another reader (e.g. an async body).
    pub fn into_parts(self) -> (File, FileStat) {
        (self.file, self.stat)
    }
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`. `hidden` names a
    /// file in the root that [`FileStore::list`] must skip.
    pub fn open<P: AsRef<Path>>(root: P, hidden: &str) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let root_canonical = root.canonicalize()?;

        Ok(Self {
            root,
            root_canonical,
            hidden: hidden.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========================================================================
    // Path resolution
    // ========================================================================

    /// Compute the on-disk path for `name` and check that it stays inside the
    /// root, following symlinks if the path already exists.
    pub fn resolve(&self, name: &SafeName) -> StorageResult<PathBuf> {
        let mut components = Path::new(name.as_str()).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(StorageError::InvalidPath(name.to_string())),
        }

        let path = self.root_canonical.join(name.as_str());

        match fs::symlink_metadata(&path) {
            Ok(meta) => {
                let canonical = path.canonicalize().map_err(|e| {
                    if meta.file_type().is_symlink() {
                        StorageError::InvalidPath(name.to_string())
                    } else {
                        StorageError::Io(e)
                    }
                })?;
                if canonical.parent() != Some(self.root_canonical.as_path()) {
                    return Err(StorageError::InvalidPath(name.to_string()));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if path.parent() != Some(self.root_canonical.as_path()) {
                    return Err(StorageError::InvalidPath(name.to_string()));
                }
            }
            Err(e) => return Err(StorageError::Io(e)),
        }

        Ok(path)
    }

    // ========================================================================
    // File operations
    // ========================================================================

    /// Write `content` under `name`, replacing any existing file.
    ///
    /// Content goes to a temporary file that is renamed into place, so readers
    /// see the old or the new file, never a partial one. With `max_bytes` set,
    /// content longer than the limit fails with `PayloadTooLarge` and nothing
    /// is left on disk.
    #[instrument(skip_all, fields(name = %name))]
    pub fn put<R: Read>(
        &self,
        name: &SafeName,
        content: R,
        max_bytes: Option<u64>,
    ) -> StorageResult<FileStat> {
        let path = self.resolve(name)?;

        let mut pending = PendingFile::create(&path)?;
        let written = pending
            .copy_limited(content, max_bytes)?
            .ok_or(StorageError::PayloadTooLarge {
                limit: max_bytes.unwrap_or_default(),
            })?;
        pending.commit()?;

        tracing::debug!(size = written, "Stored file");
        self.stat(name)
    }

    /// Open a stored file for reading.
    #[instrument(skip_all, fields(name = %name))]
    pub fn get(&self, name: &SafeName) -> StorageResult<FileReader> {
        let path = self.resolve(name)?;
        let file = File::open(&path).map_err(|e| not_found_or_io(e, name))?;

        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        Ok(FileReader {
            file,
            stat: stat_from_metadata(name.to_string(), &meta),
        })
    }

    /// Remove a stored file.
    #[instrument(skip_all, fields(name = %name))]
    pub fn delete(&self, name: &SafeName) -> StorageResult<()> {
        let path = self.resolve(name)?;

        let meta = fs::symlink_metadata(&path).map_err(|e| not_found_or_io(e, name))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        fs::remove_file(&path).map_err(|e| not_found_or_io(e, name))?;
        Ok(())
    }

    /// Check whether a regular file is stored under `name`.
    pub fn exists(&self, name: &SafeName) -> StorageResult<bool> {
        let path = self.resolve(name)?;
        match fs::symlink_metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Size and modification time of a stored file.
    pub fn stat(&self, name: &SafeName) -> StorageResult<FileStat> {
        let path = self.resolve(name)?;
        let meta = fs::metadata(&path).map_err(|e| not_found_or_io(e, name))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(stat_from_metadata(name.to_string(), &meta))
    }

    /// Stats of every regular file directly in the root, in no particular
    /// order. Subdirectories, symlinks, dot-files (including in-flight
    /// temporary files) and the hidden catalog file are skipped.
    #[instrument(skip(self))]
    pub fn list(&self) -> StorageResult<Vec<FileStat>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            // file_type() does not follow symlinks
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name == self.hidden {
                continue;
            }

            // The file may have been deleted since read_dir saw it.
            match entry.metadata() {
                Ok(meta) => files.push(stat_from_metadata(name, &meta)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            }
        }

        Ok(files)
    }
}

fn stat_from_metadata(name: String, meta: &fs::Metadata) -> FileStat {
    let modified_at = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    FileStat {
        name,
        size: meta.len(),
        modified_at,
    }
}

fn not_found_or_io(e: io::Error, name: &SafeName) -> StorageError {
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io(e)
    }
}
