//! Reads a directory of still images as a video stream.

use super::{Frame, FrameSource, timestamp_ms};
use crate::core::errors::{DetectError, DetectResult};
use crate::utils::load_image;
use std::path::{Path, PathBuf};
use tracing::debug;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Frames from the image files of a directory, sorted by file name.
#[derive(Debug)]
pub struct ImageSequenceSource {
    dir: PathBuf,
    fps: u32,
    files: Option<Vec<PathBuf>>,
    position: usize,
    dimensions: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            dir: dir.into(),
            fps,
            files: None,
            position: 0,
            dimensions: None,
        }
    }

    /// Number of images found by `open`, if opened.
    pub fn len(&self) -> Option<usize> {
        self.files.as_ref().map(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len().unwrap_or(0) == 0
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> DetectResult<()> {
        if !self.dir.is_dir() {
            return Err(DetectError::source_error(format!(
                "image directory does not exist: {}",
                self.dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        if let Some(first) = files.first() {
            self.dimensions = Some(image::image_dimensions(first).map_err(DetectError::from)?);
        }
        debug!(
            "Opened image directory {} with {} frames",
            self.dir.display(),
            files.len()
        );
        self.files = Some(files);
        self.position = 0;
        Ok(())
    }

    fn read(&mut self) -> DetectResult<Option<Frame>> {
        let Some(files) = &self.files else {
            return Err(DetectError::invalid_input("read() called before open()"));
        };
        let Some(path) = files.get(self.position) else {
            return Ok(None);
        };

        let image = load_image(path)?;
        let index = self.position as u64;
        self.position += 1;
        Ok(Some(Frame {
            index,
            timestamp_ms: timestamp_ms(index, self.fps),
            image,
        }))
    }

    fn close(&mut self) {
        self.files = None;
        self.position = 0;
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_reads_sorted_images() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(8, 6, Rgb([1, 2, 3]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(8, 6, Rgb([9, 9, 9]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceSource::new(dir.path(), 10);
        assert!(source.read().is_err());

        source.open().unwrap();
        assert_eq!(source.len(), Some(2));
        assert_eq!(source.dimensions(), Some((8, 6)));

        let first = source.read().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.image.get_pixel(0, 0), &Rgb([9, 9, 9]));

        let second = source.read().unwrap().unwrap();
        assert_eq!(second.timestamp_ms, 100.0);
        assert!(source.read().unwrap().is_none());

        source.close();
        source.close();
        assert!(source.read().is_err());
    }

    #[test]
    fn test_read_before_open_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(4, 4).save(dir.path().join("a.png")).unwrap();
        let mut source = ImageSequenceSource::new(dir.path(), 30);
        assert!(matches!(source.read(), Err(DetectError::InvalidInput { .. })));

        source.open().unwrap();
        source.close();
        assert!(matches!(source.read(), Err(DetectError::InvalidInput { .. })));
    }

    #[test]
    fn test_missing_directory() {
        let mut source = ImageSequenceSource::new("/definitely/not/here", 30);
        assert!(matches!(source.open(), Err(DetectError::Source { .. })));
    }
}
