//! MediaPipe hand models: palm detection, landmarks and gesture recognition.
//!
//! The models come from the Hand Gesture Recognizer `.task` bundle, converted
//! to ONNX. Coordinates passed between stages are normalized to the source
//! image unless a function says otherwise.

pub mod gesture;
pub mod landmark;
pub mod palm;

pub use gesture::{
    GESTURE_LABELS, Gesture, GestureConfig, GesturePrediction, GestureRecognizer,
    GestureRecognizerBuilder,
};
pub use landmark::{
    HandLandmarker, HandLandmarkerBuilder, HandLandmarkerConfig, HandLandmarks, Handedness,
    landmarks_to_roi,
};
pub use palm::{
    PalmDetection, PalmDetector, PalmDetectorBuilder, PalmDetectorConfig, decode_palm_outputs,
    palm_to_roi,
};

use crate::processors::{Point, RotatedRect, normalize_radians};
use std::f32::consts::FRAC_PI_2;

/// Number of hand landmarks.
pub const NUM_HAND_LANDMARKS: usize = 21;

/// Logistic function with the input clamped to `[-100, 100]`.
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x.clamp(-100.0, 100.0)).exp())
}

/// Maps a probability-like score into `[0, 1]`, treating out-of-range values as logits.
pub(crate) fn as_probability(x: f32) -> f32 {
    if (0.0..=1.0).contains(&x) { x } else { sigmoid(x) }
}

/// Rotation that turns the vector `from -> to` (pixel space) to point straight up.
pub(crate) fn rotation_to_vertical(from: Point, to: Point) -> f32 {
    normalize_radians(FRAC_PI_2 - (-(to.y - from.y)).atan2(to.x - from.x))
}

/// Shifts, squares and scales a pixel-space rectangle.
///
/// Shifts are fractions of the rectangle size along its own rotated axes.
pub(crate) fn transform_rect(
    rect: RotatedRect,
    shift_x: f32,
    shift_y: f32,
    scale: f32,
    square_long: bool,
) -> RotatedRect {
    let (sin, cos) = rect.rotation.sin_cos();
    let dx = rect.width * shift_x * cos - rect.height * shift_y * sin;
    let dy = rect.width * shift_x * sin + rect.height * shift_y * cos;

    let (mut width, mut height) = (rect.width, rect.height);
    if square_long {
        let long = width.max(height);
        width = long;
        height = long;
    }

    RotatedRect::new(
        rect.cx + dx,
        rect.cy + dy,
        width * scale,
        height * scale,
        rect.rotation,
    )
}
