//! The person and hand detection pipeline.
//!
//! [`HumanHandPipeline`] combines the YOLO person detector with the palm,
//! landmark and gesture models and drives them over a [`FrameSource`].
//!
//! [`FrameSource`]: crate::video::FrameSource

mod human_hand;
mod result;
mod stats;

pub use human_hand::HumanHandPipeline;
pub use result::{FrameResult, HandResult};
pub use stats::PipelineStats;
