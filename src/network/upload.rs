use crate::config::UploadSettings;
use crate::error::AppError;
use crate::pipeline::types::{StoredUpload, UploadedFile};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Writes accepted uploads into the upload directory.
///
/// Files are stored as `<uuid>.<ext>`; the client filename is never used as a
/// path, so concurrent uploads with the same name cannot collide.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    retain: bool,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, retain: bool) -> Self {
        Self {
            dir: dir.into(),
            retain,
        }
    }

    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self::new(settings.dir.clone(), settings.retain)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the upload and returns a guard that owns the stored file.
    pub async fn persist(&self, file: &UploadedFile) -> Result<UploadGuard, AppError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Upload(e, self.dir.display().to_string()))?;

        let id = Uuid::new_v4();
        let path = self.dir.join(format!("{}.{}", id, file.extension));
        tokio::fs::write(&path, &file.content)
            .await
            .map_err(|e| AppError::Upload(e, path.display().to_string()))?;
        debug!(
            "Stored upload {} ({} bytes) as {}",
            file.filename,
            file.content.len(),
            path.display()
        );

        Ok(UploadGuard {
            upload: StoredUpload {
                id,
                path,
                original_filename: file.filename.clone(),
            },
            retain: self.retain,
        })
    }
}

/// A stored upload that is removed from disk when dropped, unless the store
/// retains uploads. This includes a request future cancelled mid-inference.
/// Removal failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct UploadGuard {
    upload: StoredUpload,
    retain: bool,
}

impl Deref for UploadGuard {
    type Target = StoredUpload;

    fn deref(&self) -> &StoredUpload {
        &self.upload
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if self.retain {
            return;
        }
        match std::fs::remove_file(&self.upload.path) {
            Ok(()) => debug!("Removed upload {}", self.upload.path.display()),
            Err(e) => warn!("Failed to remove upload {}: {}", self.upload.path.display(), e),
        }
    }
}
