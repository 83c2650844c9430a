use std::path::{Path, PathBuf};

use crate::detection::YoloOptions;

pub const WEIGHTS_DIR: &str = "weights";
pub const MODEL_FILE: &str = "best.rten";
pub const LABELS_FILE: &str = "labels.txt";
pub const CATALOG_FILE: &str = "penyakit_pepaya_info.json";
pub const USERS_DB_FILE: &str = "users.db";
pub const DEFAULT_CONFIDENCE: f32 = 0.4;

/// Resource locations and detection defaults
#[derive(Debug, Clone)]
pub struct Settings {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub catalog_path: PathBuf,
    /// Font used for label text on annotated images
    pub font_path: Option<PathBuf>,
    pub users_db: PathBuf,
    pub confidence: f32,
    /// When false, sessions start signed in as the default admin
    pub enable_login: bool,
    pub yolo: YoloOptions,
}

impl Settings {
    /// Default layout relative to an application root directory
    pub fn from_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        let weights = root.join(WEIGHTS_DIR);
        Self {
            model_path: weights.join(MODEL_FILE),
            labels_path: weights.join(LABELS_FILE),
            catalog_path: root.join(CATALOG_FILE),
            font_path: None,
            users_db: root.join(USERS_DB_FILE),
            confidence: DEFAULT_CONFIDENCE,
            enable_login: false,
            yolo: YoloOptions::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_root(".")
    }
}
