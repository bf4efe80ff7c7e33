pub mod identification;
pub mod services;
pub mod types;

pub use identification::IdentificationPipeline;
pub use types::{Prediction, PreprocessedTensor, StoredUpload, UploadedFile};
