//! Model downloads over HTTP.

use crate::core::errors::{DetectError, DetectResult};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Ultralytics YOLO11n checkpoint.
pub const YOLO11N_PT_URL: &str =
    "https://github.com/ultralytics/assets/releases/download/v8.3.0/yolo11n.pt";

/// MediaPipe Hand Gesture Recognizer bundle.
pub const GESTURE_RECOGNIZER_TASK_URL: &str = "https://storage.googleapis.com/mediapipe-models/gesture_recognizer/gesture_recognizer/float16/latest/gesture_recognizer.task";

const TIMEOUT: Duration = Duration::from_secs(300);

/// Temporary path used while a download is in flight.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Downloads `url` to `dest`.
///
/// The body is streamed to `<dest>.part`, which is renamed once complete,
/// so `dest` never holds a truncated file.
pub fn download_file(url: &str, dest: &Path) -> DetectResult<u64> {
    info!("Downloading {} to {}", url, dest.display());
    let response = ureq::get(url)
        .timeout(TIMEOUT)
        .call()
        .map_err(|e| match e {
            ureq::Error::Status(code, _) => {
                DetectError::download_error(url, format!("HTTP status {}", code))
            }
            other => DetectError::download_error(url, other.to_string()),
        })?;

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let part = partial_path(dest);
    let written = {
        let mut writer = BufWriter::new(File::create(&part)?);
        let copied = io::copy(&mut response.into_reader(), &mut writer);
        copied.and_then(|n| writer.flush().map(|_| n))
    };
    let written = match written {
        Ok(n) => n,
        Err(e) => {
            if fs::remove_file(&part).is_err() {
                warn!("Could not remove {}", part.display());
            }
            return Err(DetectError::download_error(url, e.to_string()));
        }
    };

    fs::rename(&part, dest)?;
    info!("Downloaded {} bytes", written);
    Ok(written)
}
