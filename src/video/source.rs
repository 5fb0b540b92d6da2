//! Interpretation of the `video_source` configuration string.

use std::path::PathBuf;
use tracing::info;

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// A local camera by index.
    Camera(u32),
    /// A video file.
    File(PathBuf),
    /// A network stream such as `rtsp://` or `http://`.
    Url(String),
    /// A directory of still images read in name order.
    ImageDir(PathBuf),
}

impl VideoSource {
    /// Resolves a source string.
    ///
    /// An unsigned integer selects a camera. `scheme://...` is a URL. An
    /// existing directory is an image sequence. Anything else is a file.
    pub fn resolve(source: &str) -> Self {
        let trimmed = source.trim();
        let resolved = if let Ok(index) = trimmed.parse::<u32>() {
            VideoSource::Camera(index)
        } else if trimmed.contains("://") {
            VideoSource::Url(trimmed.to_string())
        } else if PathBuf::from(trimmed).is_dir() {
            VideoSource::ImageDir(PathBuf::from(trimmed))
        } else {
            VideoSource::File(PathBuf::from(trimmed))
        };

        match &resolved {
            VideoSource::Camera(idx) => info!("Using webcam index: {}", idx),
            VideoSource::File(path) => info!("Using video file: {}", path.display()),
            VideoSource::Url(url) => info!("Using video stream: {}", url),
            VideoSource::ImageDir(dir) => info!("Using image directory: {}", dir.display()),
        }
        resolved
    }
}

impl std::fmt::Display for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoSource::Camera(idx) => write!(f, "camera {idx}"),
            VideoSource::File(path) => write!(f, "{}", path.display()),
            VideoSource::Url(url) => write!(f, "{url}"),
            VideoSource::ImageDir(dir) => write!(f, "{}/", dir.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(VideoSource::resolve("0"), VideoSource::Camera(0));
        assert_eq!(VideoSource::resolve(" 2 "), VideoSource::Camera(2));
        assert_eq!(
            VideoSource::resolve("rtsp://cam.local/stream"),
            VideoSource::Url("rtsp://cam.local/stream".to_string())
        );
        assert_eq!(
            VideoSource::resolve("clip.mp4"),
            VideoSource::File(PathBuf::from("clip.mp4"))
        );
        assert_eq!(
            VideoSource::resolve("-1"),
            VideoSource::File(PathBuf::from("-1"))
        );

        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();
        assert_eq!(
            VideoSource::resolve(dir_str),
            VideoSource::ImageDir(dir.path().to_path_buf())
        );
    }
}
