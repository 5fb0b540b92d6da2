//! # human-hand-detect
//!
//! Person and hand detection on video streams with ONNX Runtime.
//!
//! People are found by a YOLO11n detector exported from Ultralytics. Hands
//! are found by the four models of the MediaPipe Hand Gesture Recognizer:
//! palm detector, hand landmark model, gesture embedder and canned gesture
//! classifier, converted to ONNX.
//!
//! ## Modules
//!
//! * [`config`] - JSON application configuration
//! * [`core`] - Error handling, ONNX Runtime settings and the inference engine
//! * [`models`] - YOLO and MediaPipe hand model wrappers
//! * [`pipeline`] - Per-frame person and hand detection with hand tracking
//! * [`processors`] - Geometry, letterboxing, normalization, NMS and anchors
//! * [`video`] - Cameras, video files, streams and image directories
//! * [`assets`] - `.task` bundle unpacking, YOLO export and downloads
//! * [`utils`] - Image loading and result visualization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use human_hand_detect::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! human_hand_detect::core::init_tracing(false);
//!
//! let config = AppConfig::from_file("config.json")?;
//! let mut pipeline = HumanHandPipeline::from_config(&config)?;
//! let mut capture = VideoCapture::new(config.video_source(), config.video_fps());
//!
//! let stats = pipeline.run(&mut capture, Some(100), |_, result| {
//!     println!("{}", result);
//!     Ok(())
//! })?;
//! println!("{}", stats);
//! # Ok(())
//! # }
//! ```
//!
//! ### Single image
//!
//! ```rust,no_run
//! use human_hand_detect::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_file("config.json")?;
//! let mut pipeline = HumanHandPipeline::from_config(&config)?;
//! let image = load_image(Path::new("people.jpg"))?;
//! let result = pipeline.process_frame(&image)?;
//! for hand in &result.hands {
//!     println!("{} hand: {}", hand.landmarks.handedness, hand.gesture);
//! }
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod config;
pub mod core;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod utils;
pub mod video;

pub use crate::core::{DetectError, DetectResult};

/// Prelude module for convenient imports.
///
/// ```rust
/// use human_hand_detect::prelude::*;
/// ```
///
/// Included items cover running the pipeline end to end. Model wrappers and
/// processors are imported from their modules.
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::core::{DetectError, DetectResult};
    pub use crate::models::{Gesture, Handedness};
    pub use crate::pipeline::{FrameResult, HandResult, HumanHandPipeline, PipelineStats};
    pub use crate::utils::load_image;
    pub use crate::video::{Frame, FrameSource, VideoCapture};
}
