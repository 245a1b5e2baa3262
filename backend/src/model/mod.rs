pub mod mask;
#[cfg(feature = "torch")]
pub mod torch;
pub mod yolo;

use image::RgbImage;

pub use mask::{MaskError, MaskGrid};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Engine error: {0}")]
    Engine(String),
    #[error("Unexpected model output: {0}")]
    OutputShape(String),
    #[error("Inference task was cancelled")]
    Cancelled,
    #[cfg(feature = "torch")]
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[cfg(feature = "torch")]
    #[error("Model file not found: {0}")]
    NotFound(String),
    #[error("No inference backend compiled in (enable the '{0}' feature)")]
    BackendUnavailable(&'static str),
    #[cfg(feature = "torch")]
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),
}

/// One detected object as produced by the engine, before any filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub mask: MaskGrid,
    pub confidence: f32,
    pub class_index: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Detections {
    /// The engine produced no masks or boxes for the image.
    NoDetections,
    Found(Vec<RawDetection>),
}

impl Detections {
    pub fn len(&self) -> usize {
        match self {
            Detections::NoDetections => 0,
            Detections::Found(items) => items.len(),
        }
    }
}

impl From<Vec<RawDetection>> for Detections {
    fn from(items: Vec<RawDetection>) -> Self {
        if items.is_empty() {
            Detections::NoDetections
        } else {
            Detections::Found(items)
        }
    }
}

/// Instance segmentation backend.
///
/// Calls may block; callers run them off the async workers. Implementations
/// that wrap non-thread-safe state serialize access internally.
pub trait InferenceEngine: Send + Sync {
    fn infer(&self, image: &RgbImage) -> Result<Detections, InferenceError>;
}
