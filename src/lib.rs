pub mod catalog;
pub mod core;
pub mod detection;
pub mod history;
pub mod input;
pub mod models;
pub mod pipeline;
pub mod session;
pub mod settings;
pub mod shell;

pub use catalog::{DiseaseCatalog, FALLBACK_DESCRIPTION};
pub use detection::{Detection, DetectError, Detector, YoloDetector};
pub use history::HistoryStore;
pub use input::InputImage;
pub use models::{BoundingBox, DetectedRegion, DetectionRecord, Explanation, InputSource};
pub use pipeline::{DetectionPipeline, PipelineError, PipelineWarning, ValidationError};
pub use session::{AuthState, Session, SessionError};
pub use settings::Settings;
