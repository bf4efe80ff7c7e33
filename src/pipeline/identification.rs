use crate::error::AppError;
use crate::pipeline::services::{ClassificationService, PreprocessingService};
use crate::pipeline::types::{Prediction, StoredUpload};
use tower::ServiceExt;
use tracing::debug;

/// Preprocess then classify one stored upload.
#[derive(Clone)]
pub struct IdentificationPipeline {
    preprocessing: PreprocessingService,
    classification: ClassificationService,
}

impl IdentificationPipeline {
    pub fn new(preprocessing: PreprocessingService, classification: ClassificationService) -> Self {
        Self {
            preprocessing,
            classification,
        }
    }

    pub async fn identify(&self, upload: StoredUpload) -> Result<Prediction, AppError> {
        let id = upload.id;
        let tensor = self.preprocessing.clone().oneshot(upload).await?;
        debug!("Upload {} preprocessed to {:?}", id, tensor.shape());
        self.classification.clone().oneshot(tensor).await
    }
}
