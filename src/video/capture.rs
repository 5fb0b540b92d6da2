//! Source-agnostic capture with logging.

use super::{Frame, FfmpegSource, FrameSource, ImageSequenceSource, VideoSource};
use crate::core::errors::DetectResult;
use tracing::{debug, error, warn};

/// Wraps a [`FrameSource`] chosen from a configuration string.
///
/// ```no_run
/// use human_hand_detect::video::{FrameSource, VideoCapture};
///
/// let mut capture = VideoCapture::new("clip.mp4", 30);
/// capture.open()?;
/// while let Some(frame) = capture.read()? {
///     println!("frame {}", frame.index);
/// }
/// # Ok::<(), human_hand_detect::DetectError>(())
/// ```
pub struct VideoCapture {
    source: VideoSource,
    fps: u32,
    backend: Box<dyn FrameSource>,
    opened: bool,
}

impl std::fmt::Debug for VideoCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoCapture")
            .field("source", &self.source)
            .field("fps", &self.fps)
            .field("opened", &self.opened)
            .finish()
    }
}

impl VideoCapture {
    /// Resolves `source` and selects a backend. Nothing is opened yet.
    pub fn new(source: &str, fps: u32) -> Self {
        let source = VideoSource::resolve(source);
        let backend: Box<dyn FrameSource> = match &source {
            VideoSource::ImageDir(dir) => Box::new(ImageSequenceSource::new(dir.clone(), fps)),
            other => Box::new(FfmpegSource::new(other.clone(), fps)),
        };
        Self::with_backend(source, fps, backend)
    }

    /// Uses an explicit backend.
    pub fn with_backend(source: VideoSource, fps: u32, backend: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            fps,
            backend,
            opened: false,
        }
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }
}

impl FrameSource for VideoCapture {
    fn open(&mut self) -> DetectResult<()> {
        if let Err(e) = self.backend.open() {
            error!("Failed to open video source: {}", self.source);
            return Err(e);
        }
        self.opened = true;
        debug!("Video source opened: {}", self.source);
        if let Some((w, h)) = self.backend.dimensions() {
            debug!("Frame dimensions: {}x{}", w, h);
        }
        Ok(())
    }

    fn read(&mut self) -> DetectResult<Option<Frame>> {
        if !self.opened {
            error!("read() called before open().");
            return Ok(None);
        }
        match self.backend.read()? {
            Some(frame) => Ok(Some(frame)),
            None => {
                warn!("Failed to read frame.");
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        if self.opened {
            self.backend.close();
            self.opened = false;
            debug!("Video source released.");
        }
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.backend.dimensions()
    }
}

impl Drop for VideoCapture {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_directory_capture() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            RgbImage::from_pixel(4, 4, Rgb([i * 50, 0, 0]))
                .save(dir.path().join(format!("frame_{i:03}.png")))
                .unwrap();
        }

        let mut capture = VideoCapture::new(dir.path().to_str().unwrap(), 30);
        assert!(matches!(capture.source(), VideoSource::ImageDir(_)));
        assert!(capture.read().unwrap().is_none());

        capture.open().unwrap();
        assert_eq!(capture.dimensions(), Some((4, 4)));
        let mut count = 0;
        while let Some(frame) = capture.read().unwrap() {
            assert_eq!(frame.index, count);
            count += 1;
        }
        assert_eq!(count, 3);

        capture.close();
        assert!(!capture.is_opened());
        capture.close();
    }

    #[test]
    fn test_camera_string_selects_camera() {
        let capture = VideoCapture::new("0", 30);
        assert_eq!(capture.source(), &VideoSource::Camera(0));
        assert_eq!(capture.fps(), 30);
    }
}
