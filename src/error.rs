use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub const NOT_FOUND_MESSAGE: &str = "Animal information not found.";
pub const TOO_LARGE_MESSAGE: &str = "Uploaded file is too large.";
pub const INTERNAL_MESSAGE: &str = "An error occurred while processing the request.";

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Upload exceeds the configured size limit")]
    UploadTooLarge,
    #[error("No catalog entry for predicted label '{0}'")]
    AnimalNotFound(String),
    #[error("Failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Failed to store upload {1}: {0}")]
    Upload(std::io::Error, String),
    #[error("Worker task failed: {0}")]
    Task(String),
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to bind to {1}: {0}")]
    Bind(std::io::Error, String),
    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

// Client-side upload rejections. Display is the message returned to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file part")]
    NoFilePart,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("Invalid file type")]
    InvalidFileType,
    #[error("Malformed multipart body")]
    MalformedMultipart,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::AnimalNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `error` field of the response body. Internal
    /// failures all share one message so callers cannot tell decode errors
    /// from inference errors.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(reason) => reason.to_string(),
            AppError::UploadTooLarge => TOO_LARGE_MESSAGE.to_string(),
            AppError::AnimalNotFound(_) => NOT_FOUND_MESSAGE.to_string(),
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self);
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_map_to_bad_request() {
        let err = AppError::from(ValidationError::NoSelectedFile);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "No selected file");
    }

    #[test]
    fn test_internal_errors_hide_their_cause() {
        let decode = AppError::Inference("shape mismatch [1, 3, 224, 224]".to_string());
        let io = AppError::Upload(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            "uploads/x.png".to_string(),
        );
        for err in [decode, io] {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.public_message(), INTERNAL_MESSAGE);
        }
    }

    #[test]
    fn test_not_found_message() {
        let err = AppError::AnimalNotFound("elephant".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), NOT_FOUND_MESSAGE);
    }
}
