use crate::config::TensorLayout;
use crate::error::AppError;

/// Batch of one normalized image, laid out as `layout` describes.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedTensor {
    shape: [usize; 4],
    layout: TensorLayout,
    data: Vec<f32>,
}

impl PreprocessedTensor {
    pub fn new(shape: [usize; 4], layout: TensorLayout, data: Vec<f32>) -> Result<Self, AppError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(AppError::Inference(format!(
                "tensor data has {} values, shape {:?} needs {}",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self {
            shape,
            layout,
            data,
        })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}
