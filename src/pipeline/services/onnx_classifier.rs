use crate::config::{ModelSettings, TensorLayout};
use crate::error::AppError;
use crate::pipeline::services::classification::{Classifier, argmax, softmax};
use crate::pipeline::types::{PreprocessedTensor, Prediction};
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::{debug, info};

type OnnxPlan = TypedRunnableModel<TypedModel>;

/// One class of the model's output, decoded from the label file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Class index to label table.
///
/// Each non-blank line is one class, in output order. A line is either
/// `n02129165 lion, king of beasts, Panthera leo` or just
/// `lion, king of beasts`. The display name is the first comma-separated
/// alias with spaces replaced by underscores.
#[derive(Debug, Clone)]
pub struct LabelMap {
    labels: Vec<Label>,
}

impl LabelMap {
    pub fn parse(text: &str) -> Result<Self, AppError> {
        let labels: Vec<Label> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| parse_label(index, line))
            .collect();
        if labels.is_empty() {
            return Err(AppError::ModelLoad("label file is empty".to_string()));
        }
        Ok(Self { labels })
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Picks the top-1 class from raw model scores.
    ///
    /// Models exported with a leading background class emit one more score
    /// than there are labels; that extra first score is skipped.
    pub fn top_prediction(&self, scores: &[f32], apply_softmax: bool) -> Result<Prediction, AppError> {
        let offset = match scores.len().checked_sub(self.labels.len()) {
            Some(0) => 0,
            Some(1) => 1,
            _ => {
                return Err(AppError::Inference(format!(
                    "model produced {} scores for {} labels",
                    scores.len(),
                    self.labels.len()
                )));
            }
        };
        let scores = &scores[offset..];
        if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
            return Err(AppError::Inference(format!(
                "model produced non-finite score {} at class {}",
                scores[index], index
            )));
        }
        let probabilities;
        let scores = if apply_softmax {
            probabilities = softmax(scores);
            &probabilities[..]
        } else {
            scores
        };

        let (index, confidence) = argmax(scores)
            .ok_or_else(|| AppError::Inference("model output is empty".to_string()))?;
        let label = self
            .get(index)
            .ok_or_else(|| AppError::Inference(format!("class index {} has no label", index)))?;
        Ok(Prediction {
            label_id: label.id.clone(),
            name: label.name.clone(),
            confidence,
        })
    }
}

fn parse_label(index: usize, line: &str) -> Label {
    let (id, names) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) if is_synset_id(head) => (head.to_string(), rest),
        _ => (index.to_string(), line),
    };
    let name = names
        .split(',')
        .next()
        .unwrap_or(names)
        .trim()
        .replace(' ', "_");
    Label { id, name }
}

fn is_synset_id(token: &str) -> bool {
    token.len() == 9
        && token.starts_with('n')
        && token[1..].chars().all(|c| c.is_ascii_digit())
}

/// ImageNet-style ONNX classifier executed with tract.
///
/// Built once at startup; the optimized plan is immutable and shared by every
/// request.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    labels: LabelMap,
    input_shape: [usize; 4],
    apply_softmax: bool,
}

impl OnnxClassifier {
    pub fn load(settings: &ModelSettings) -> Result<Self, AppError> {
        let labels = LabelMap::from_path(&settings.labels_path)?;
        let size = settings.input_size as usize;
        let input_shape = match settings.layout {
            TensorLayout::Nhwc => [1, size, size, 3],
            TensorLayout::Nchw => [1, 3, size, size],
        };

        info!(
            "Loading model {} with input {:?}",
            settings.path.display(),
            input_shape
        );
        let plan = tract_onnx::onnx()
            .model_for_path(&settings.path)
            .and_then(|model| model.with_input_fact(0, f32::fact(input_shape).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| AppError::ModelLoad(format!("{}: {}", settings.path.display(), e)))?;
        info!("Model ready with {} labels", labels.len());

        Ok(Self {
            plan,
            labels,
            input_shape,
            apply_softmax: settings.apply_softmax,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, tensor: &PreprocessedTensor) -> Result<Prediction, AppError> {
        if tensor.shape() != self.input_shape {
            return Err(AppError::Inference(format!(
                "expected input shape {:?}, got {:?}",
                self.input_shape,
                tensor.shape()
            )));
        }

        let input = Tensor::from_shape(&tensor.shape(), tensor.data())
            .map_err(|e| AppError::Inference(e.to_string()))?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| AppError::Inference(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| AppError::Inference("model returned no outputs".to_string()))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| AppError::Inference(e.to_string()))?
            .iter()
            .cloned()
            .collect();

        let prediction = self.labels.top_prediction(&scores, self.apply_softmax)?;
        debug!(
            "Top-1 prediction {} ({}) with confidence {:.4}",
            prediction.name, prediction.label_id, prediction.confidence
        );
        Ok(prediction)
    }
}
