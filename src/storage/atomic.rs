use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A temporary file next to its final destination.
///
/// The temporary file is removed on drop unless [`PendingFile::commit`]
/// renamed it into place, so an error or panic mid-write never leaves a
/// partial file behind.
pub(crate) struct PendingFile {
    file: Option<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl PendingFile {
    /// Create `.<name>.tmp.<uuid>` in the same directory as `final_path`.
    pub(crate) fn create(final_path: &Path) -> io::Result<Self> {
        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path =
            final_path.with_file_name(format!(".{file_name}.tmp.{}", Uuid::new_v4()));
        let file = File::create(&temp_path)?;

        Ok(Self {
            file: Some(file),
            temp_path,
            final_path: final_path.to_path_buf(),
        })
    }

    /// Copy at most `limit` bytes from `reader`. Returns `None` if the reader
    /// had more than `limit` bytes to give.
    pub(crate) fn copy_limited<R: Read>(
        &mut self,
        reader: R,
        limit: Option<u64>,
    ) -> io::Result<Option<u64>> {
        let file = self.file_mut()?;
        match limit {
            Some(limit) => {
                let written = io::copy(&mut reader.take(limit.saturating_add(1)), file)?;
                Ok((written <= limit).then_some(written))
            }
            None => {
                let mut reader = reader;
                io::copy(&mut reader, file).map(Some)
            }
        }
    }

    pub(crate) fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.file_mut()?.write_all(data)
    }

    /// Flush to disk and rename over the final path.
    pub(crate) fn commit(mut self) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        fs::rename(&self.temp_path, &self.final_path)?;
        // Renamed: nothing left for Drop to clean up.
        self.temp_path = PathBuf::new();
        Ok(())
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("pending file already committed"))
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.temp_path.as_os_str().is_empty() {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                tracing::warn!(
                    path = %self.temp_path.display(),
                    error = %e,
                    "Failed to remove temporary file"
                );
            }
        }
    }
}

/// Replace `path` with `data` so readers see either the old or the new
/// content in full.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut pending = PendingFile::create(path)?;
    pending.write_all(data)?;
    pending.commit()
}

