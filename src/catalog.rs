use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Description returned for labels the catalog does not know
pub const FALLBACK_DESCRIPTION: &str = "Info tidak tersedia";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Disease catalog not found: {path}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Disease catalog {path} is not a flat JSON object of strings: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Static mapping from disease label to description.
///
/// Lookups are exact and case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct DiseaseCatalog {
    entries: HashMap<String, String>,
}

impl DiseaseCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Load the catalog from a JSON file such as
    /// `{"BlackSpot": "Fungal infection causing black lesions."}`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loaded {} catalog entries from {:?}", entries.len(), path);
        Ok(Self { entries })
    }

    /// Load the catalog, degrading to an empty one when the file is missing or
    /// malformed. The error is handed back so the caller can surface it.
    pub fn load_or_fallback<P: AsRef<Path>>(path: P) -> (Self, Option<CatalogError>) {
        match Self::load(path) {
            Ok(catalog) => (catalog, None),
            Err(err) => {
                warn!("{}; all labels will use the fallback description", err);
                (Self::empty(), Some(err))
            }
        }
    }

    /// Description for `label`, or [`FALLBACK_DESCRIPTION`] when absent
    pub fn lookup(&self, label: &str) -> &str {
        self.entries
            .get(label)
            .map(String::as_str)
            .unwrap_or(FALLBACK_DESCRIPTION)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lookup_falls_back_for_unknown_labels() {
        let catalog = DiseaseCatalog::from_map(HashMap::from([(
            "BlackSpot".to_string(),
            "Fungal infection causing black lesions.".to_string(),
        )]));

        assert_eq!(
            catalog.lookup("BlackSpot"),
            "Fungal infection causing black lesions."
        );
        assert_eq!(catalog.lookup("blackspot"), FALLBACK_DESCRIPTION);
        assert_eq!(catalog.lookup(""), FALLBACK_DESCRIPTION);
        assert_eq!(DiseaseCatalog::empty().lookup("Anthracnose"), FALLBACK_DESCRIPTION);
    }

    #[test]
    fn load_rejects_nested_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Ringspot": {{"text": "virus"}}}}"#).unwrap();

        let err = DiseaseCatalog::load(file.path()).unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[test]
    fn missing_file_degrades_to_empty_catalog() {
        let dir = tempfile::TempDir::new().unwrap();
        let (catalog, err) = DiseaseCatalog::load_or_fallback(dir.path().join("missing.json"));

        assert!(catalog.is_empty());
        assert!(matches!(err, Some(CatalogError::NotFound { .. })));
    }
}
