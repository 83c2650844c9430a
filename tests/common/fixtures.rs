use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageBuffer, RgbImage, Rgb};
use papaya_detect::core::db::UserDb;
use papaya_detect::detection::Annotator;
use papaya_detect::{
    BoundingBox, DetectError, DetectedRegion, Detection, DetectionPipeline, Detector,
    DiseaseCatalog, InputImage, InputSource,
};
use tempfile::NamedTempFile;

pub const BLACK_SPOT_DESCRIPTION: &str = "Fungal infection causing black lesions.";

/// Detector returning a fixed set of regions, filtered by the threshold
pub struct FakeDetector {
    regions: Vec<DetectedRegion>,
    class_names: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeDetector {
    pub fn new(regions: Vec<DetectedRegion>) -> Self {
        let mut class_names: Vec<String> = Vec::new();
        for region in &regions {
            if !class_names.contains(&region.class_label) {
                class_names.push(region.class_label.clone());
            }
        }
        Self {
            regions,
            class_names,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Detector whose every call fails with an inference error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for FakeDetector {
    fn detect(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Detection, DetectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DetectError::Inference("corrupt image data".to_string()));
        }
        let regions: Vec<DetectedRegion> = self
            .regions
            .iter()
            .filter(|r| r.confidence >= confidence_threshold)
            .cloned()
            .collect();
        let annotated = Annotator::new().annotate(image, &regions);
        Ok(Detection { annotated, regions })
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

/// Region with a box placed by index so regions do not overlap
pub fn region(class_id: usize, label: &str, confidence: f32) -> DetectedRegion {
    let x = 5.0 + class_id as f32 * 30.0;
    DetectedRegion {
        class_id,
        class_label: label.to_string(),
        confidence,
        bbox: BoundingBox {
            x1: x,
            y1: 20.0,
            x2: x + 20.0,
            y2: 60.0,
        },
    }
}

/// The three regions of the BlackSpot/Anthracnose scenario
pub fn scenario_regions() -> Vec<DetectedRegion> {
    vec![
        region(0, "BlackSpot", 0.8),
        region(0, "BlackSpot", 0.5),
        region(1, "Anthracnose", 0.6),
    ]
}

pub fn scenario_catalog() -> DiseaseCatalog {
    DiseaseCatalog::from_map(HashMap::from([(
        "BlackSpot".to_string(),
        BLACK_SPOT_DESCRIPTION.to_string(),
    )]))
}

/// Pipeline over a shared fake detector, so tests can inspect call counts
pub fn make_pipeline(detector: Arc<FakeDetector>, catalog: DiseaseCatalog) -> DetectionPipeline {
    DetectionPipeline::new(detector, catalog)
}

/// Creates a 100x100 green test image
pub fn test_image() -> RgbImage {
    ImageBuffer::from_fn(100, 100, |_, _| Rgb([40u8, 160u8, 60u8]))
}

pub fn make_input(file_name: &str) -> InputImage {
    InputImage::new(
        test_image(),
        InputSource::Upload {
            file_name: file_name.to_string(),
        },
    )
}

/// Saves the test image in `format` to a temp file with the given suffix.
/// The file is removed when dropped.
pub fn create_test_image_file(suffix: &str, format: image::ImageFormat) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp image file");
    test_image()
        .save_with_format(file.path(), format)
        .expect("Failed to save test image");
    file
}

pub fn encode(format: image::ImageFormat) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    test_image()
        .write_to(&mut bytes, format)
        .expect("Failed to encode test image");
    bytes.into_inner()
}

/// Creates a credential database in a temp directory (keep the dir alive).
/// Uses a low iteration count to keep tests fast.
pub async fn create_test_user_db() -> (UserDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let users = UserDb::open(dir.path().join("users.db"))
        .await
        .expect("Failed to open test user db")
        .with_hash_iterations(1_000);
    (users, dir)
}
