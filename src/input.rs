use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, ImageReader, RgbImage};
use thiserror::Error;

use crate::models::InputSource;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Unsupported upload format for '{file_name}': only JPEG and PNG are accepted")]
    UnsupportedFormat { file_name: String },

    #[error("Could not decode image '{name}': {reason}")]
    Undecodable { name: String, reason: String },

    #[error("Could not read image file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An image normalised to RGB8, ready for the detection pipeline
#[derive(Debug, Clone)]
pub struct InputImage {
    pub image: RgbImage,
    pub source: InputSource,
}

impl InputImage {
    pub fn new(image: RgbImage, source: InputSource) -> Self {
        Self { image, source }
    }

    /// Decode an uploaded file. Only JPEG and PNG are accepted.
    pub fn from_upload(file_name: &str, bytes: &[u8]) -> Result<Self, InputError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| InputError::Undecodable {
                name: file_name.to_string(),
                reason: e.to_string(),
            })?;

        match reader.format() {
            Some(ImageFormat::Jpeg) | Some(ImageFormat::Png) => {}
            _ => {
                return Err(InputError::UnsupportedFormat {
                    file_name: file_name.to_string(),
                });
            }
        }

        let img = reader.decode().map_err(|e| InputError::Undecodable {
            name: file_name.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            image: img.to_rgb8(),
            source: InputSource::Upload {
                file_name: file_name.to_string(),
            },
        })
    }

    /// Decode a single still frame captured from a camera
    pub fn from_camera_frame(bytes: &[u8]) -> Result<Self, InputError> {
        let img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| InputError::Undecodable {
                name: "camera frame".to_string(),
                reason: e.to_string(),
            })?
            .decode()
            .map_err(|e| InputError::Undecodable {
                name: "camera frame".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            image: img.to_rgb8(),
            source: InputSource::Camera,
        })
    }

    /// Read a file from disk with upload semantics
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, InputError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| InputError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_upload(&file_name, &bytes)
    }

    /// Read a camera still saved to disk
    pub fn open_camera_frame<P: AsRef<Path>>(path: P) -> Result<Self, InputError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| InputError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_camera_frame(&bytes)
    }
}
