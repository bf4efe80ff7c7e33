use crate::catalog::AnimalRecord;
use crate::error::{AppError, ValidationError};
use crate::network::server::AppState;
use crate::pipeline::types::{StoredUpload, UploadedFile};
use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifyResponse {
    #[serde(rename = "Animal")]
    pub animal: String,
    #[serde(rename = "Classification")]
    pub classification: String,
    #[serde(rename = "Venomous")]
    pub venomous: String,
    #[serde(rename = "Dangerous")]
    pub dangerous: String,
    #[serde(rename = "How to get rid of")]
    pub how_to_get_rid_of: String,
}

impl IdentifyResponse {
    pub fn new(animal: &str, record: &AnimalRecord) -> Self {
        Self {
            animal: animal.to_string(),
            classification: record.classification.clone(),
            venomous: yes_no(record.venomous),
            dangerous: yes_no(record.dangerous),
            how_to_get_rid_of: record.remediation.clone(),
        }
    }
}

fn yes_no(flag: bool) -> String {
    let answer = if flag { "Yes" } else { "No" };
    answer.to_string()
}

/// `POST /identify`: validate, store, classify and describe one image.
#[instrument(skip_all)]
pub async fn identify(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IdentifyResponse>, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Request is not a multipart upload: {}", rejection);
        ValidationError::NoFilePart
    })?;
    let file = read_upload(&mut multipart).await?;
    info!(
        "Received upload {} ({} bytes)",
        file.filename,
        file.content.len()
    );

    let stored = state.uploads.persist(&file).await?;
    let outcome = state.pipeline.identify(StoredUpload::clone(&stored)).await;
    drop(stored);
    let prediction = outcome?;

    let record = state
        .catalog
        .lookup(&prediction.name)
        .ok_or_else(|| AppError::AnimalNotFound(prediction.name.clone()))?;
    info!(
        "Identified {} as {} (confidence {:.3})",
        file.filename, prediction.name, prediction.confidence
    );
    Ok(Json(IdentifyResponse::new(&prediction.name, record)))
}

/// Finds the `file` field and checks its filename and extension.
///
/// A part without a `filename` parameter is a plain form value, not a file,
/// even when it is named `file`.
async fn read_upload(multipart: &mut Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            debug!("Skipping form value named {}", FILE_FIELD);
            continue;
        };
        if filename.is_empty() {
            return Err(ValidationError::NoSelectedFile.into());
        }
        let content = field.bytes().await.map_err(multipart_error)?;
        return Ok(UploadedFile::new(&filename, content)?);
    }
    Err(ValidationError::NoFilePart.into())
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::UploadTooLarge;
    }
    warn!("Failed to read multipart body: {}", err.body_text());
    ValidationError::MalformedMultipart.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AnimalCatalog;

    #[test]
    fn test_response_uses_display_keys() {
        let catalog = AnimalCatalog::builtin();
        let response = IdentifyResponse::new("cobra", catalog.lookup("cobra").unwrap());
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["Animal"], "cobra");
        assert_eq!(value["Venomous"], "Yes");
        assert_eq!(value["Dangerous"], "Yes");
        assert_eq!(value["Classification"], "Reptile, Squamata, Elapidae");
        assert!(value["How to get rid of"].as_str().unwrap().contains("snake"));
        assert_eq!(value.as_object().unwrap().len(), 5);
    }
}
