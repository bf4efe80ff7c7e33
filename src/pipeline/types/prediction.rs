use serde::Serialize;

/// Top-1 classifier output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label_id: String,
    pub name: String,
    pub confidence: f32,
}
