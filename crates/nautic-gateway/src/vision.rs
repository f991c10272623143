//! Vision backend contract and its registry capability.
//!
//! The inference engine itself is not part of this workspace. A host links
//! one in by supplying a [`ModelLoader`] that turns the model file into a
//! [`VisionBackend`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use nautic_core::Capability;
use serde::Serialize;
use thiserror::Error;

/// Slot name of the vision backend.
pub const VISION_CAPABILITY: &str = "vision";

/// Axis-aligned box in pixel or normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Scale pixel coordinates into `[0, 1]`.
    pub fn normalized(&self, size: ImageSize) -> Self {
        let w = size.width.max(1) as f32;
        let h = size.height.max(1) as f32;
        Self {
            x1: self.x1 / w,
            y1: self.y1 / h,
            x2: self.x2 / w,
            y2: self.y2 / h,
        }
    }
}

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f32,
    /// Pixel coordinates.
    pub bbox: BoundingBox,
    pub bbox_normalized: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Result of running detection on one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    pub detections: Vec<Detection>,
    pub image_size: ImageSize,
    pub inference_time_ms: f64,
}

/// Image with detections drawn on it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedImage {
    /// JPEG encoded image.
    pub jpeg: Vec<u8>,
    pub detection_count: usize,
    pub image_size: ImageSize,
    pub inference_time_ms: f64,
}

/// Vision backend errors.
#[derive(Debug, Error)]
pub enum VisionError {
    /// The upload could not be decoded as an image.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The engine failed while running the model.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Object detection over encoded images.
///
/// Calls are blocking; the gateway runs them on the blocking pool. The
/// confidence threshold is passed per call so concurrent requests never
/// observe each other's threshold.
pub trait VisionBackend: Send + Sync {
    /// Name of the loaded model, for logs and responses.
    fn model_name(&self) -> &str;

    /// Detect objects at or above `confidence`.
    fn detect(&self, image: &[u8], confidence: f32) -> Result<DetectionReport, VisionError>;

    /// Detect objects and draw them onto the image.
    fn annotate(&self, image: &[u8], confidence: f32) -> Result<AnnotatedImage, VisionError>;
}

/// Model weights read from disk.
#[derive(Clone)]
pub struct ModelFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// BLAKE3 digest of `bytes`, hex encoded.
    pub digest: String,
}

impl ModelFile {
    pub fn new(path: PathBuf, bytes: Vec<u8>) -> Self {
        let digest = blake3::hash(&bytes).to_hex().to_string();
        Self {
            path,
            bytes,
            digest,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl std::fmt::Debug for ModelFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelFile")
            .field("path", &self.path)
            .field("size", &self.size())
            .field("digest", &self.digest)
            .finish()
    }
}

/// Builds a backend from model weights. Runs on the blocking pool.
pub type ModelLoader =
    Arc<dyn Fn(ModelFile) -> Result<Arc<dyn VisionBackend>, String> + Send + Sync>;

/// Loader used when no inference engine is linked in.
pub fn unlinked_loader() -> ModelLoader {
    Arc::new(|model: ModelFile| {
        Err(format!(
            "no inference engine is linked into this build (model {} found, blake3 {})",
            model.path.display(),
            model.digest
        ))
    })
}

/// Capability that loads the vision backend from a model file.
///
/// The probe only checks that the file exists.
pub struct ModelFileCapability {
    path: PathBuf,
    loader: ModelLoader,
}

impl ModelFileCapability {
    pub fn new(path: impl Into<PathBuf>, loader: ModelLoader) -> Self {
        Self {
            path: path.into(),
            loader,
        }
    }
}

#[async_trait]
impl Capability for ModelFileCapability {
    type Instance = dyn VisionBackend;

    fn name(&self) -> &'static str {
        VISION_CAPABILITY
    }

    fn probe(&self) -> bool {
        self.path.is_file()
    }

    async fn initialize(&self) -> Result<Arc<dyn VisionBackend>, String> {
        let path = self.path.clone();
        let loader = self.loader.clone();

        tokio::task::spawn_blocking(move || -> Result<Arc<dyn VisionBackend>, String> {
            let bytes = std::fs::read(&path)
                .map_err(|e| format!("failed to read model {}: {}", path.display(), e))?;
            let model = ModelFile::new(path, bytes);
            tracing::info!(
                path = %model.path.display(),
                size = model.size(),
                digest = %model.digest,
                "model file loaded"
            );

            let backend = loader(model)?;
            tracing::info!(model = backend.model_name(), "vision backend ready");
            Ok(backend)
        })
        .await
        .map_err(|e| format!("model loading task failed: {}", e))?
    }
}
