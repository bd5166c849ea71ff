//! Private photo file storage.
//!
//! # Responsibility
//! - Write captured/imported photos as JPEG files under the private directory.
//! - Read them back as decoded bitmaps for rendering.
//! - Identify files this catalog manages (`IMG_<uuid>.jpg`).

use std::error::Error;
use std::fmt::{Display, Formatter};

mod photo_store;

pub use photo_store::{is_managed_file_name, path_to_string, PhotoStore, JPEG_QUALITY};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    /// Decoding the input or encoding the JPEG failed.
    Image(image::ImageError),
    InvalidPath(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Image(err) => write!(f, "image codec error: {err}"),
            Self::InvalidPath(message) => write!(f, "invalid photo path: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Image(err) => Some(err),
            Self::InvalidPath(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<image::ImageError> for StorageError {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}
