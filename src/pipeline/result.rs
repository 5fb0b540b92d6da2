//! Per-frame results.

use crate::models::{Detection, Gesture, HandLandmarks};
use crate::processors::RotatedRect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One tracked hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandResult {
    pub landmarks: HandLandmarks,
    pub gesture: Gesture,
    pub gesture_score: f32,
    /// Region the landmarks were computed in, in source pixels
    pub roi: RotatedRect,
}

/// Everything detected in one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub frame_index: u64,
    pub people: Vec<Detection>,
    pub hands: Vec<HandResult>,
    /// Wall time spent on all models for this frame
    pub inference_ms: f64,
}

impl FrameResult {
    pub fn is_empty(&self) -> bool {
        self.people.is_empty() && self.hands.is_empty()
    }
}

impl fmt::Display for FrameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {}: {} people, {} hands",
            self.frame_index,
            self.people.len(),
            self.hands.len()
        )?;
        for hand in &self.hands {
            write!(
                f,
                " [{} {} {:.2}]",
                hand.landmarks.handedness, hand.gesture, hand.gesture_score
            )?;
        }
        write!(f, " in {:.1} ms", self.inference_ms)
    }
}
