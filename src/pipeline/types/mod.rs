mod prediction;
mod preprocessed_tensor;
mod stored_upload;
mod uploaded_file;

pub use prediction::Prediction;
pub use preprocessed_tensor::PreprocessedTensor;
pub use stored_upload::StoredUpload;
pub use uploaded_file::{ALLOWED_EXTENSIONS, UploadedFile, allowed_extension};
