use crate::config::{ModelSettings, Normalization, TensorLayout};
use crate::error::AppError;
use crate::pipeline::types::{PreprocessedTensor, StoredUpload};
use image::imageops::FilterType;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
// Caffe-style means, in BGR order.
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// Decodes image bytes and turns them into the model's input tensor.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    input_size: u32,
    layout: TensorLayout,
    normalization: Normalization,
}

impl ImagePreprocessor {
    pub fn new(input_size: u32, layout: TensorLayout, normalization: Normalization) -> Self {
        Self {
            input_size,
            layout,
            normalization,
        }
    }

    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self::new(settings.input_size, settings.layout, settings.normalization)
    }

    /// Decode, stretch to `input_size`², normalize and add the batch axis.
    /// Aspect ratio is not preserved.
    pub fn prepare(&self, raw: &[u8]) -> Result<PreprocessedTensor, AppError> {
        let image = image::load_from_memory(raw)?;
        debug!(
            "Decoded {}x{} image, resizing to {}x{}",
            image.width(),
            image.height(),
            self.input_size,
            self.input_size
        );
        let resized = image
            .resize_exact(self.input_size, self.input_size, FilterType::Triangle)
            .to_rgb8();

        let size = self.input_size as usize;
        let plane = size * size;
        let mut data = vec![0.0f32; plane * 3];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let values = self.normalize(pixel.0);
            let offset = y as usize * size + x as usize;
            for (c, value) in values.into_iter().enumerate() {
                let index = match self.layout {
                    TensorLayout::Nhwc => offset * 3 + c,
                    TensorLayout::Nchw => c * plane + offset,
                };
                data[index] = value;
            }
        }

        let shape = match self.layout {
            TensorLayout::Nhwc => [1, size, size, 3],
            TensorLayout::Nchw => [1, 3, size, size],
        };
        PreprocessedTensor::new(shape, self.layout, data)
    }

    /// Maps one RGB pixel to the model's channel order and value range.
    fn normalize(&self, [r, g, b]: [u8; 3]) -> [f32; 3] {
        let rgb = [r as f32, g as f32, b as f32];
        match self.normalization {
            Normalization::MobileNet => rgb.map(|v| v / 127.5 - 1.0),
            Normalization::Unit => rgb.map(|v| v / 255.0),
            Normalization::Torch => std::array::from_fn(|c| {
                (rgb[c] / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
            }),
            Normalization::Caffe => [
                rgb[2] - CAFFE_MEAN_BGR[0],
                rgb[1] - CAFFE_MEAN_BGR[1],
                rgb[0] - CAFFE_MEAN_BGR[2],
            ],
        }
    }
}

/// Reads a stored upload and preprocesses it on the blocking pool.
#[derive(Debug, Clone)]
pub struct PreprocessingService {
    preprocessor: Arc<ImagePreprocessor>,
}

impl PreprocessingService {
    pub fn new(preprocessor: ImagePreprocessor) -> Self {
        Self {
            preprocessor: Arc::new(preprocessor),
        }
    }
}

impl Service<StoredUpload> for PreprocessingService {
    type Response = PreprocessedTensor;
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: StoredUpload) -> Self::Future {
        let preprocessor = self.preprocessor.clone();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let raw = std::fs::read(&request.path)
                    .map_err(|e| AppError::Upload(e, request.path.display().to_string()))?;
                preprocessor.prepare(&raw)
            })
            .await
            .map_err(|e| AppError::Task(e.to_string()))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use uuid::Uuid;

    fn encoded(width: u32, height: u32, color: [u8; 3], format: ImageFormat) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(
            width,
            height,
            Rgb(color),
        ));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_prepare_produces_batched_nhwc_tensor() {
        let preprocessor = ImagePreprocessor::new(224, TensorLayout::Nhwc, Normalization::MobileNet);
        let tensor = preprocessor
            .prepare(&encoded(640, 480, [255, 0, 128], ImageFormat::Png))
            .unwrap();

        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
        assert_eq!(tensor.data().len(), 224 * 224 * 3);
        assert!(tensor.data().iter().all(|v| (-1.0..=1.0).contains(v)));
        let first = &tensor.data()[..3];
        assert!((first[0] - 1.0).abs() < 1e-2);
        assert!((first[1] + 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_prepare_nchw_layout_groups_channels() {
        let preprocessor = ImagePreprocessor::new(8, TensorLayout::Nchw, Normalization::Unit);
        let tensor = preprocessor
            .prepare(&encoded(3, 5, [255, 0, 0], ImageFormat::Png))
            .unwrap();

        assert_eq!(tensor.shape(), [1, 3, 8, 8]);
        let plane = 64;
        assert!(tensor.data()[..plane].iter().all(|v| (*v - 1.0).abs() < 1e-2));
        assert!(tensor.data()[plane..].iter().all(|v| v.abs() < 1e-2));
    }

    #[test]
    fn test_caffe_normalization_swaps_to_bgr() {
        let preprocessor = ImagePreprocessor::new(4, TensorLayout::Nhwc, Normalization::Caffe);
        let values = preprocessor.normalize([10, 20, 30]);
        assert!((values[0] - (30.0 - 103.939)).abs() < 1e-4);
        assert!((values[2] - (10.0 - 123.68)).abs() < 1e-4);
    }

    #[test]
    fn test_torch_normalization_uses_imagenet_stats() {
        let preprocessor = ImagePreprocessor::new(4, TensorLayout::Nhwc, Normalization::Torch);
        let values = preprocessor.normalize([255, 0, 128]);
        assert!((values[0] - (1.0 - 0.485) / 0.229).abs() < 1e-4);
        assert!((values[1] - (-0.456 / 0.224)).abs() < 1e-4);
        assert!((values[2] - (128.0 / 255.0 - 0.406) / 0.225).abs() < 1e-4);
    }

    #[test]
    fn test_prepare_accepts_jpeg() {
        let preprocessor = ImagePreprocessor::new(224, TensorLayout::Nhwc, Normalization::Torch);
        let tensor = preprocessor
            .prepare(&encoded(32, 32, [40, 80, 120], ImageFormat::Jpeg))
            .unwrap();
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
    }

    #[test]
    fn test_prepare_rejects_corrupt_bytes() {
        let preprocessor = ImagePreprocessor::new(224, TensorLayout::Nhwc, Normalization::MobileNet);
        let result = preprocessor.prepare(b"\xff\xd8\xff\xe0 definitely not a jpeg");
        assert!(matches!(result, Err(AppError::ImageDecode(_))));
    }

    #[tokio::test]
    async fn test_service_reads_stored_upload() {
        use tower::ServiceExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.png");
        std::fs::write(&path, encoded(10, 10, [0, 0, 0], ImageFormat::Png)).unwrap();

        let service = PreprocessingService::new(ImagePreprocessor::new(
            16,
            TensorLayout::Nhwc,
            Normalization::Unit,
        ));
        let tensor = service
            .oneshot(StoredUpload {
                id: Uuid::new_v4(),
                path,
                original_filename: "upload.png".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(tensor.shape(), [1, 16, 16, 3]);
        assert!(tensor.data().iter().all(|v| *v == 0.0));
    }
}
