//! Model assets: bundle unpacking, YOLO export and downloads.

pub mod bundle;
#[cfg(feature = "download")]
pub mod download;
pub mod export;

pub use bundle::{
    GESTURE_RECOGNIZER_DIR, GestureModelFiles, HAND_LANDMARKER_DIR, TaskBundleLayout,
    unpack_task_bundle, verify_gesture_layout,
};
#[cfg(feature = "download")]
pub use download::{GESTURE_RECOGNIZER_TASK_URL, YOLO11N_PT_URL, download_file};
pub use export::YoloExport;
