use crate::error::ValidationError;
use bytes::Bytes;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// One image received in a multipart upload, already checked for a usable
/// filename and an allowed extension.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content: Bytes,
    pub extension: String,
}

impl UploadedFile {
    pub fn new(filename: &str, content: Bytes) -> Result<Self, ValidationError> {
        if filename.is_empty() {
            return Err(ValidationError::NoSelectedFile);
        }
        let extension = allowed_extension(filename).ok_or(ValidationError::InvalidFileType)?;
        Ok(Self {
            filename: filename.to_string(),
            content,
            extension,
        })
    }
}

/// Returns the lowercased suffix after the last dot when it is an accepted
/// image extension.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, suffix) = filename.rsplit_once('.')?;
    let suffix = suffix.to_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&suffix.as_str())
        .then_some(suffix)
}
