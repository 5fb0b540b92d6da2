//! Utility functions for loading and drawing images.

pub mod image;
pub mod visualization;

pub use image::{DEFAULT_PARALLEL_THRESHOLD, create_rgb_image, load_image, load_images_batch};
pub use visualization::{VisualizationConfig, draw_frame_result, save_visualization};
