//! JPEG writer/reader for the private photo directory.
//!
//! # Invariants
//! - Every written file is named `IMG_<uuid-v4>.jpg` and encoded at quality 95.
//! - Returned paths are absolute; the directory is canonicalized on open.
//! - A partially written file is removed when encoding fails.

use crate::storage::{StorageError, StorageResult};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// JPEG quality used for every stored photo.
pub const JPEG_QUALITY: u8 = 95;

const FILE_PREFIX: &str = "IMG_";
const FILE_EXTENSION: &str = "jpg";

static MANAGED_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^IMG_[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.jpg$")
        .expect("valid managed file regex")
});

/// Returns whether `file_name` follows the `IMG_<uuid>.jpg` convention.
pub fn is_managed_file_name(file_name: &str) -> bool {
    MANAGED_FILE_RE.is_match(file_name)
}

/// Photo directory handle.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    /// Opens (and creates when missing) the private photo directory.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let dir = dir.canonicalize()?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decodes raw image bytes (any supported format) and stores them as JPEG.
    pub fn write_bytes(&self, bytes: &[u8]) -> StorageResult<PathBuf> {
        let bitmap = image::load_from_memory(bytes)?;
        self.write_bitmap(&bitmap)
    }

    /// Encodes a decoded bitmap as a new JPEG file and returns its path.
    pub fn write_bitmap(&self, bitmap: &DynamicImage) -> StorageResult<PathBuf> {
        let path = self
            .dir
            .join(format!("{FILE_PREFIX}{}.{FILE_EXTENSION}", Uuid::new_v4()));

        if let Err(err) = encode_jpeg(&path, bitmap) {
            if let Err(cleanup_err) = std::fs::remove_file(&path) {
                if cleanup_err.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "event=photo_write module=storage status=cleanup_failed error={}",
                        cleanup_err
                    );
                }
            }
            return Err(err);
        }

        debug!(
            "event=photo_write module=storage status=ok width={} height={}",
            bitmap.width(),
            bitmap.height()
        );
        Ok(path)
    }

    /// Removes a stored photo. Returns `false` when the file was already gone.
    pub fn remove(&self, path: &Path) -> StorageResult<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads a stored photo back. Missing or undecodable files yield `None`.
    pub fn load_bitmap(&self, path: &Path) -> Option<DynamicImage> {
        if !path.exists() {
            return None;
        }
        match image::open(path) {
            Ok(bitmap) => Some(bitmap),
            Err(err) => {
                warn!(
                    "event=photo_read module=storage status=error error_code=decode_failed error={}",
                    err
                );
                None
            }
        }
    }

    /// Lists files in the directory that follow the managed naming convention.
    pub fn managed_files(&self) -> StorageResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_managed_file_name(name) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Converts a stored path into the string persisted in `images.file_path`.
pub fn path_to_string(path: &Path) -> StorageResult<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| StorageError::InvalidPath(format!("{} is not UTF-8", path.display())))
}

fn encode_jpeg(path: &Path, bitmap: &DynamicImage) -> StorageResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let rgb = bitmap.to_rgb8();
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(&rgb)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{is_managed_file_name, PhotoStore};
    use image::{DynamicImage, RgbImage};

    fn sample_bitmap() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(16, 12, |x, y| {
            image::Rgb([(x * 15) as u8, (y * 20) as u8, 90])
        }))
    }

    #[test]
    fn write_bitmap_creates_managed_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(dir.path().join("photos")).unwrap();

        let path = store.write_bitmap(&sample_bitmap()).unwrap();
        assert!(path.is_absolute());
        assert!(path.exists());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(is_managed_file_name(name), "unexpected name {name}");

        let loaded = store.load_bitmap(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (16, 12));
    }

    #[test]
    fn write_bytes_rejects_garbage_without_leaving_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(dir.path()).unwrap();

        assert!(store.write_bytes(b"definitely not an image").is_err());
        assert!(store.managed_files().unwrap().is_empty());
    }

    #[test]
    fn remove_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(dir.path()).unwrap();
        let path = store.write_bitmap(&sample_bitmap()).unwrap();

        assert!(store.remove(&path).unwrap());
        assert!(!store.remove(&path).unwrap());
        assert!(store.load_bitmap(&path).is_none());
    }

    #[test]
    fn managed_files_ignores_foreign_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("IMG_custom.jpg"), b"x").unwrap();
        let path = store.write_bitmap(&sample_bitmap()).unwrap();

        assert_eq!(store.managed_files().unwrap(), vec![path]);
    }

    #[test]
    fn managed_file_name_matches_uuid_convention() {
        assert!(is_managed_file_name(
            "IMG_67e55044-10b1-426f-9247-bb680e5fe0c8.jpg"
        ));
        assert!(!is_managed_file_name("IMG_67e55044.jpg"));
        assert!(!is_managed_file_name("img_67e55044-10b1-426f-9247-bb680e5fe0c8.jpg"));
    }
}
