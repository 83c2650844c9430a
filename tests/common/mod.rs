#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from papaya_detect for tests
pub use papaya_detect::{
    DetectionPipeline, DetectionRecord, DiseaseCatalog, Explanation, FALLBACK_DESCRIPTION,
    HistoryStore, InputImage, PipelineError, Session, SessionError, ValidationError,
};
