//! Image processing used around model inference.
//!
//! This module contains:
//! - Geometric primitives ([`geometry`])
//! - Aspect-preserving resize ([`letterbox`])
//! - Pixel normalization into tensors ([`normalization`])
//! - Non-maximum suppression ([`nms`])
//! - SSD anchor generation ([`anchors`])
//! - Rotated crop extraction ([`roi`])

pub mod anchors;
pub mod geometry;
pub mod letterbox;
pub mod nms;
pub mod normalization;
pub mod roi;
pub mod types;

pub use anchors::{Anchor, SsdAnchorOptions, generate_anchors};
pub use geometry::{BBox, Point, Point3, RotatedRect, normalize_radians};
pub use letterbox::{Letterbox, LetterboxInfo};
pub use nms::{ScoredRegion, class_aware_nms, nms, weighted_nms};
pub use normalization::NormalizeImage;
pub use roi::{RoiTransform, warp_rotated_roi};
pub use types::{ChannelOrder, Interpolation};
