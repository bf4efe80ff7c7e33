use crate::error::AppError;
use crate::pipeline::types::{PreprocessedTensor, Prediction};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// A pretrained image classifier returning only its top-1 prediction.
///
/// Implementations are shared across concurrent requests and must not mutate
/// themselves while predicting.
pub trait Classifier: Send + Sync {
    fn classify(&self, tensor: &PreprocessedTensor) -> Result<Prediction, AppError>;
}

/// Runs the shared classifier on the blocking pool.
#[derive(Clone)]
pub struct ClassificationService {
    classifier: Arc<dyn Classifier>,
}

impl ClassificationService {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }
}

impl Service<PreprocessedTensor> for ClassificationService {
    type Response = Prediction;
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: PreprocessedTensor) -> Self::Future {
        let classifier = self.classifier.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || classifier.classify(&request))
                .await
                .map_err(|e| AppError::Task(e.to_string()))?
        })
    }
}

/// Numerically stable softmax over finite logits.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index and score of the highest value. NaN scores never win.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .cloned()
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}
