//! Types used in image processing operations.

use serde::{Deserialize, Serialize};

/// Specifies the order of channels in an image tensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOrder {
    /// Channel, Height, Width order (YOLO exports)
    #[default]
    CHW,
    /// Height, Width, Channel order (MediaPipe hand models)
    HWC,
}

/// Interpolation used when sampling a warped region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}
