pub mod annotate;
pub mod postprocess;
pub mod preprocessing;
pub mod yolo;

use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;

use crate::models::DetectedRegion;

pub use annotate::Annotator;
pub use yolo::{YoloDetector, YoloOptions};

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Unable to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Unable to load class labels {path}: {reason}")]
    LabelsLoad { path: PathBuf, reason: String },

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Output of a single detector call
#[derive(Debug, Clone)]
pub struct Detection {
    /// Input image with a box and label tab for every region (RGB order)
    pub annotated: RgbImage,
    pub regions: Vec<DetectedRegion>,
}

/// Object detection backend.
///
/// Implementations convert their native model output into [`DetectedRegion`]
/// values at this boundary. Every returned region must have a confidence of
/// at least `confidence_threshold`.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Detection, DetectError>;

    /// Class names indexed by class id
    fn class_names(&self) -> &[String];
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Detection, DetectError> {
        (**self).detect(image, confidence_threshold)
    }

    fn class_names(&self) -> &[String] {
        (**self).class_names()
    }
}

impl<D: Detector + ?Sized> Detector for std::sync::Arc<D> {
    fn detect(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Detection, DetectError> {
        (**self).detect(image, confidence_threshold)
    }

    fn class_names(&self) -> &[String] {
        (**self).class_names()
    }
}
