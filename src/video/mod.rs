//! Frame sources: cameras, video files, streams and image directories.
//!
//! [`VideoCapture`] is the entry point; it resolves a configuration string to
//! a [`VideoSource`] and drives the matching [`FrameSource`] backend.

pub mod capture;
pub mod ffmpeg;
pub mod image_sequence;
pub mod source;

pub use capture::VideoCapture;
pub use ffmpeg::FfmpegSource;
pub use image_sequence::ImageSequenceSource;
pub use source::VideoSource;

use crate::core::errors::DetectResult;
use image::RgbImage;

/// A decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position in the stream.
    pub index: u64,
    /// Presentation time derived from the index and the target frame rate.
    pub timestamp_ms: f64,
    pub image: RgbImage,
}

/// A pull-based producer of frames.
pub trait FrameSource: Send {
    /// Opens the underlying device, process or directory.
    fn open(&mut self) -> DetectResult<()>;

    /// Returns the next frame, or `Ok(None)` at end of stream.
    fn read(&mut self) -> DetectResult<Option<Frame>>;

    /// Releases resources. Calling it twice is harmless.
    fn close(&mut self);

    /// Frame dimensions once known.
    fn dimensions(&self) -> Option<(u32, u32)>;
}

pub(crate) fn timestamp_ms(index: u64, fps: u32) -> f64 {
    index as f64 * 1000.0 / fps.max(1) as f64
}
