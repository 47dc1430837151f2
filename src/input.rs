//! Image input.
//!
//! An `AnalysisImage` is decoded once and handed to both engines. Its capture time is
//! the file modification time, so repeated analyses of the same file carry the same
//! timestamp.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbImage;

use crate::error::InputError;

pub struct AnalysisImage {
    source: Option<PathBuf>,
    pixels: RgbImage,
    captured_at: SystemTime,
}

impl AnalysisImage {
    /// Decode an image file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, InputError> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(InputError::NotFound(path.to_path_buf())),
        };
        let pixels = image::open(path)
            .map_err(|e| InputError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .to_rgb8();
        let captured_at = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        log::debug!(
            "decoded {} ({}x{})",
            path.display(),
            pixels.width(),
            pixels.height()
        );
        Ok(Self {
            source: Some(path.to_path_buf()),
            pixels,
            captured_at,
        })
    }

    /// Wrap in-memory pixels, stamped with the current wall-clock time.
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self {
            source: None,
            pixels,
            captured_at: SystemTime::now(),
        }
    }

    pub fn with_captured_at(mut self, captured_at: SystemTime) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Capture time in seconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.captured_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn open_reads_png_and_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bird.png");
        RgbImage::from_pixel(6, 4, image::Rgb([200, 40, 10]))
            .save(&path)
            .unwrap();

        let image = AnalysisImage::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (6, 4));
        assert_eq!(image.source(), Some(path.as_path()));
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(
            image.timestamp(),
            mtime.duration_since(UNIX_EPOCH).unwrap().as_secs_f64()
        );
    }

    #[test]
    fn open_missing_file() {
        let err = AnalysisImage::open("/nonexistent/bird.jpg").err().unwrap();
        assert!(matches!(err, InputError::NotFound(_)));
    }

    #[test]
    fn open_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        fs::write(&path, b"not an image").unwrap();
        let err = AnalysisImage::open(&path).err().unwrap();
        assert!(matches!(err, InputError::Decode { .. }));
    }

    #[test]
    fn captured_at_drives_timestamp() {
        let image = AnalysisImage::from_rgb(RgbImage::new(2, 2))
            .with_captured_at(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        assert_eq!(image.timestamp(), 1_700_000_000.0);
        assert!(image.source().is_none());
    }
}
