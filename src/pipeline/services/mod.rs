pub mod classification;
pub mod onnx_classifier;
pub mod preprocessing;

pub use classification::{ClassificationService, Classifier};
pub use onnx_classifier::{LabelMap, OnnxClassifier};
pub use preprocessing::{ImagePreprocessor, PreprocessingService};
