use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, DiseaseCatalog};
use crate::detection::yolo::load_class_names;
use crate::detection::{Annotator, DetectError, Detector, YoloDetector};
use crate::input::{InputError, InputImage};
use crate::models::{DetectionRecord, Explanation};
use crate::settings::Settings;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Confidence threshold {0} is outside 0..=1")]
    ThresholdOutOfRange(f32),

    #[error(transparent)]
    Input(#[from] InputError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Model could not be loaded; the pipeline cannot be built
    #[error("Unable to load detection resources: {0}")]
    ResourceLoad(#[source] DetectError),

    /// The model failed on this image; nothing was recorded
    #[error("Detection failed: {0}")]
    Inference(#[source] DetectError),

    #[error("Invalid detection input: {0}")]
    Validation(#[from] ValidationError),
}

impl From<InputError> for PipelineError {
    fn from(err: InputError) -> Self {
        PipelineError::Validation(ValidationError::Input(err))
    }
}

/// Non-fatal problems found while building a pipeline
#[derive(Debug)]
pub enum PipelineWarning {
    /// Every label will resolve to the fallback description
    CatalogUnavailable(CatalogError),
    /// Labels fall back to the bundled font
    FontUnavailable(String),
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::CatalogUnavailable(err) => {
                write!(f, "{}; disease descriptions are unavailable", err)
            }
            PipelineWarning::FontUnavailable(reason) => {
                write!(f, "Label font unavailable ({}); using the bundled font", reason)
            }
        }
    }
}

/// Debug output configuration
#[derive(Clone, Debug)]
pub struct DebugConfig {
    pub output_dir: PathBuf,
}

/// Turns one input image into a [`DetectionRecord`]
pub struct DetectionPipeline {
    detector: Arc<dyn Detector>,
    catalog: DiseaseCatalog,
    debug: Option<DebugConfig>,
    runs: AtomicUsize,
}

impl std::fmt::Debug for DetectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionPipeline")
            .field("classes", &self.detector.class_names())
            .field("catalog_entries", &self.catalog.len())
            .field("debug", &self.debug)
            .finish()
    }
}

impl DetectionPipeline {
    pub fn new(detector: Arc<dyn Detector>, catalog: DiseaseCatalog) -> Self {
        Self {
            detector,
            catalog,
            debug: None,
            runs: AtomicUsize::new(0),
        }
    }

    /// Build the pipeline from configured resources.
    ///
    /// A model that cannot be loaded is fatal. A missing or malformed catalog
    /// only produces a warning.
    pub fn from_settings(settings: &Settings) -> Result<(Self, Vec<PipelineWarning>), PipelineError> {
        let mut warnings = Vec::new();

        let class_names =
            load_class_names(&settings.labels_path).map_err(PipelineError::ResourceLoad)?;
        let mut detector = YoloDetector::load(&settings.model_path, class_names, settings.yolo.clone())
            .map_err(PipelineError::ResourceLoad)?;

        if let Some(font_path) = &settings.font_path {
            match Annotator::with_font_file(font_path) {
                Ok(annotator) => detector = detector.with_annotator(annotator),
                Err(e) => {
                    warn!("Could not load font {:?}: {}", font_path, e);
                    warnings.push(PipelineWarning::FontUnavailable(e.to_string()));
                }
            }
        }

        let (pipeline, catalog_warnings) = Self::with_detector(Arc::new(detector), settings);
        warnings.extend(catalog_warnings);
        Ok((pipeline, warnings))
    }

    /// Build the pipeline around an already loaded detector, reading the
    /// catalog from `settings`
    pub fn with_detector(detector: Arc<dyn Detector>, settings: &Settings) -> (Self, Vec<PipelineWarning>) {
        let mut warnings = Vec::new();
        let (catalog, catalog_err) = DiseaseCatalog::load_or_fallback(&settings.catalog_path);
        if let Some(err) = catalog_err {
            warnings.push(PipelineWarning::CatalogUnavailable(err));
        }
        (Self::new(detector, catalog), warnings)
    }

    /// Save source and annotated images of every run into `output_dir`.
    /// The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    pub fn catalog(&self) -> &DiseaseCatalog {
        &self.catalog
    }

    pub fn detector(&self) -> &dyn Detector {
        self.detector.as_ref()
    }

    /// Run detection on one image.
    ///
    /// Fails with a validation error before the model runs if the threshold is
    /// outside `0..=1`. Zero detections is a successful, empty record.
    pub fn run(&self, input: InputImage, confidence_threshold: f32) -> Result<DetectionRecord, PipelineError> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(ValidationError::ThresholdOutOfRange(confidence_threshold).into());
        }

        debug!(
            "Running detection on {} ({}x{}) at confidence {:.2}",
            input.source,
            input.image.width(),
            input.image.height(),
            confidence_threshold
        );

        let detection = self
            .detector
            .detect(&input.image, confidence_threshold)
            .map_err(PipelineError::Inference)?;

        let labels: BTreeSet<&str> = detection
            .regions
            .iter()
            .map(|region| region.class_label.as_str())
            .collect();

        let explanations: Vec<Explanation> = labels
            .into_iter()
            .map(|label| Explanation {
                label: label.to_string(),
                description: self.catalog.lookup(label).to_string(),
            })
            .collect();

        info!(
            "Detected {} regions ({} distinct diseases) in {}",
            detection.regions.len(),
            explanations.len(),
            input.source
        );

        let record = DetectionRecord::new(
            input.image,
            detection.annotated,
            detection.regions,
            explanations,
            input.source,
            confidence_threshold,
        );

        let run_index = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        if let Err(e) = self.save_debug_output(run_index, &record) {
            warn!("Failed to save debug output: {:#}", e);
        }

        Ok(record)
    }

    fn save_debug_output(&self, run_index: usize, record: &DetectionRecord) -> anyhow::Result<()> {
        let Some(debug_config) = &self.debug else {
            return Ok(());
        };

        for (suffix, img) in [
            ("source", record.source_image()),
            ("annotated", record.annotated_image()),
        ] {
            let path = debug_config
                .output_dir
                .join(format!("{:02}_{}.png", run_index, suffix));
            img.save(&path)
                .with_context(|| format!("Failed to save debug image {:?}", path))?;
            debug!("Debug: saved {}", path.display());
        }
        Ok(())
    }
}
