use std::path::PathBuf;
use uuid::Uuid;

/// An accepted upload persisted under the upload directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub id: Uuid,
    pub path: PathBuf,
    pub original_filename: String,
}
