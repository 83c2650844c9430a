use image::RgbImage;
use serde::Serialize;
use time::OffsetDateTime;

/// Axis-aligned box in source image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build from YOLO center format (cx, cy, w, h)
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// Clamp to an image of the given size
    pub fn clamp(&self, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// One finding produced by a detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedRegion {
    pub class_id: usize,
    pub class_label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A disease label with its human-readable description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub label: String,
    pub description: String,
}

impl std::fmt::Display for Explanation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "**{}**: {}", self.label, self.description)
    }
}

/// Where a detection input came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    Upload { file_name: String },
    Camera,
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Upload { file_name } => write!(f, "upload '{}'", file_name),
            InputSource::Camera => write!(f, "camera"),
        }
    }
}

/// Result of one successful pipeline run.
///
/// Images are stored in RGB channel order. Fields are read-only after
/// construction; the history owns records once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    source_image: RgbImage,
    annotated_image: RgbImage,
    regions: Vec<DetectedRegion>,
    explanations: Vec<Explanation>,
    input: InputSource,
    confidence_threshold: f32,
    detected_at: OffsetDateTime,
}

impl DetectionRecord {
    pub(crate) fn new(
        source_image: RgbImage,
        annotated_image: RgbImage,
        regions: Vec<DetectedRegion>,
        explanations: Vec<Explanation>,
        input: InputSource,
        confidence_threshold: f32,
    ) -> Self {
        Self {
            source_image,
            annotated_image,
            regions,
            explanations,
            input,
            confidence_threshold,
            detected_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn source_image(&self) -> &RgbImage {
        &self.source_image
    }

    pub fn annotated_image(&self) -> &RgbImage {
        &self.annotated_image
    }

    pub fn regions(&self) -> &[DetectedRegion] {
        &self.regions
    }

    pub fn explanations(&self) -> &[Explanation] {
        &self.explanations
    }

    pub fn input(&self) -> &InputSource {
        &self.input
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn detected_at(&self) -> OffsetDateTime {
        self.detected_at
    }
}
