//! Run statistics.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::FrameResult;

/// Totals for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Frames processed.
    pub frames: u64,
    /// People detected, summed over frames.
    pub people: u64,
    /// Hands detected, summed over frames.
    pub hands: u64,
    /// Inference time summed over frames, in milliseconds.
    pub total_ms: f64,
    /// Average inference time per frame, in milliseconds.
    pub avg_ms: f64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one frame's results.
    pub fn record(&mut self, result: &FrameResult) {
        self.frames += 1;
        self.people += result.people.len() as u64;
        self.hands += result.hands.len() as u64;
        self.total_ms += result.inference_ms;
        self.avg_ms = self.total_ms / self.frames as f64;
    }

    /// Average processing speed in frames per second.
    pub fn frames_per_second(&self) -> f64 {
        if self.avg_ms == 0.0 {
            0.0
        } else {
            1000.0 / self.avg_ms
        }
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Statistics:")?;
        writeln!(f, "  Frames processed: {}", self.frames)?;
        writeln!(f, "  People detected: {}", self.people)?;
        writeln!(f, "  Hands detected: {}", self.hands)?;
        writeln!(f, "  Average inference time: {:.2} ms", self.avg_ms)?;
        writeln!(
            f,
            "  Processing speed: {:.2} frames/sec",
            self.frames_per_second()
        )?;
        Ok(())
    }
}
