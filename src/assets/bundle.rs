//! MediaPipe `.task` bundles.
//!
//! A `.task` file is a zip archive. The Hand Gesture Recognizer bundle holds
//! two nested `.task` archives, one per sub-task, each carrying two `.tflite`
//! models. Unpacking expands the nested archives as well, giving:
//!
//! ```text
//! <out>/hand_landmarker/hand_detector.tflite
//! <out>/hand_landmarker/hand_landmarks_detector.tflite
//! <out>/hand_gesture_recognizer/gesture_embedder.tflite
//! <out>/hand_gesture_recognizer/canned_gesture_classifier.tflite
//! ```

use crate::core::errors::{DetectError, DetectResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Extension of MediaPipe task bundles.
pub const TASK_EXTENSION: &str = "task";

/// Nested archives deeper than this are left packed.
const MAX_NESTING: usize = 4;

/// Sub-task directory holding the palm and landmark models.
pub const HAND_LANDMARKER_DIR: &str = "hand_landmarker";
/// Sub-task directory holding the gesture models.
pub const GESTURE_RECOGNIZER_DIR: &str = "hand_gesture_recognizer";

/// What an unpacked bundle contains. Paths are relative to `root`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBundleLayout {
    pub root: PathBuf,
    pub subdirectories: Vec<PathBuf>,
    pub tflite_files: Vec<PathBuf>,
}

impl TaskBundleLayout {
    /// Scans a directory tree.
    pub fn scan(root: &Path) -> DetectResult<Self> {
        let mut layout = Self {
            root: root.to_path_buf(),
            ..Default::default()
        };
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                if path.is_dir() {
                    layout.subdirectories.push(relative);
                    pending.push(path);
                } else if path.extension().is_some_and(|e| e == "tflite") {
                    layout.tflite_files.push(relative);
                }
            }
        }
        layout.subdirectories.sort();
        layout.tflite_files.sort();
        Ok(layout)
    }
}

/// The four models of the Hand Gesture Recognizer bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureModelFiles {
    pub hand_detector: PathBuf,
    pub hand_landmarks_detector: PathBuf,
    pub gesture_embedder: PathBuf,
    pub canned_gesture_classifier: PathBuf,
}

impl GestureModelFiles {
    /// Expected locations below `dir`.
    pub fn expected_in(dir: &Path) -> Self {
        let landmarker = dir.join(HAND_LANDMARKER_DIR);
        let gestures = dir.join(GESTURE_RECOGNIZER_DIR);
        Self {
            hand_detector: landmarker.join("hand_detector.tflite"),
            hand_landmarks_detector: landmarker.join("hand_landmarks_detector.tflite"),
            gesture_embedder: gestures.join("gesture_embedder.tflite"),
            canned_gesture_classifier: gestures.join("canned_gesture_classifier.tflite"),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [
            &self.hand_detector,
            &self.hand_landmarks_detector,
            &self.gesture_embedder,
            &self.canned_gesture_classifier,
        ]
    }

    /// Where the ONNX conversions of the four models are expected.
    pub fn onnx_paths(&self) -> [PathBuf; 4] {
        self.all().map(|p| p.with_extension("onnx"))
    }
}

/// Unpacks a `.task` bundle into `out_dir`, expanding nested bundles.
///
/// Entries whose paths would land outside `out_dir` are rejected.
pub fn unpack_task_bundle(task_path: &Path, out_dir: &Path) -> DetectResult<TaskBundleLayout> {
    if !task_path.is_file() {
        return Err(DetectError::bundle_error(format!(
            "bundle not found: {}",
            task_path.display()
        )));
    }
    info!(
        "Unpacking {} into {}",
        task_path.display(),
        out_dir.display()
    );
    extract_archive(task_path, out_dir, 0)?;
    let layout = TaskBundleLayout::scan(out_dir)?;
    info!(
        "Unpacked {} directories and {} .tflite files",
        layout.subdirectories.len(),
        layout.tflite_files.len()
    );
    Ok(layout)
}

fn extract_archive(archive_path: &Path, out_dir: &Path, depth: usize) -> DetectResult<()> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    fs::create_dir_all(out_dir)?;

    let mut nested = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(DetectError::bundle_error(format!(
                "entry '{}' in {} escapes the output directory",
                entry.name(),
                archive_path.display()
            )));
        };
        let target = out_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        debug!("extracted {}", target.display());

        if target.extension().is_some_and(|e| e == TASK_EXTENSION) {
            nested.push(target);
        }
    }

    for inner in nested {
        if depth + 1 >= MAX_NESTING {
            warn!("Not expanding deeply nested bundle {}", inner.display());
            continue;
        }
        let Some(stem) = inner.file_stem() else {
            continue;
        };
        let dest = inner.with_file_name(stem);
        extract_archive(&inner, &dest, depth + 1)?;
    }
    Ok(())
}

/// Checks that `dir` has the Hand Gesture Recognizer layout.
///
/// The error lists every missing file.
pub fn verify_gesture_layout(dir: &Path) -> DetectResult<GestureModelFiles> {
    let files = GestureModelFiles::expected_in(dir);
    let missing: Vec<String> = files
        .all()
        .iter()
        .filter(|p| !p.is_file())
        .map(|p| p.strip_prefix(dir).unwrap_or(*p).display().to_string())
        .collect();

    if missing.is_empty() {
        debug!("Gesture bundle layout verified in {}", dir.display());
        Ok(files)
    } else {
        Err(DetectError::bundle_error(format!(
            "{} is missing {}",
            dir.display(),
            missing.join(", ")
        )))
    }
}
