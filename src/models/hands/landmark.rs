//! Hand landmark regression on a rotated hand crop.

use super::{NUM_HAND_LANDMARKS, as_probability, rotation_to_vertical, transform_rect};
use crate::core::config::{ConfigError, ConfigValidator, OrtSessionConfig};
use crate::core::inference::InferenceEngine;
use crate::core::{DetectError, NamedOutput, SimpleError, Tensor4D};
use crate::models::load_engine;
use crate::processors::{
    ChannelOrder, NormalizeImage, Point, Point3, RoiTransform, RotatedRect, warp_rotated_roi,
};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

const LANDMARK_VALUES: usize = NUM_HAND_LANDMARKS * 3;

/// Landmarks used to bound the hand when tracking: wrist, and the base and
/// first joint of each finger.
const TRACKING_SUBSET: [usize; 12] = [0, 1, 2, 3, 5, 6, 9, 10, 13, 14, 17, 18];

/// Which hand the model believes it sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Classifies a right-hand probability.
    pub fn from_score(right_probability: f32) -> Self {
        if right_probability > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }
}

impl std::fmt::Display for Handedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handedness::Left => write!(f, "Left"),
            Handedness::Right => write!(f, "Right"),
        }
    }
}

/// Configuration for the hand landmark model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandLandmarkerConfig {
    /// Square model input size
    pub input_size: u32,
    /// Minimum hand presence score
    pub presence_threshold: f32,
}

impl Default for HandLandmarkerConfig {
    fn default() -> Self {
        Self {
            input_size: 224,
            presence_threshold: 0.5,
        }
    }
}

impl ConfigValidator for HandLandmarkerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_unit_interval("presence_threshold", self.presence_threshold)?;
        self.validate_positive("input_size", self.input_size as i64)?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Landmarks of one hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandLandmarks {
    /// Image landmarks; `x` and `y` normalized to the image, `z` on the `x` scale
    pub landmarks: [Point3; NUM_HAND_LANDMARKS],
    /// World landmarks in metres, origin at the hand's center
    pub world: [Point3; NUM_HAND_LANDMARKS],
    pub handedness: Handedness,
    /// Probability that this is a right hand
    pub handedness_score: f32,
    pub presence: f32,
}

impl HandLandmarks {
    /// Landmark positions in image pixels.
    pub fn pixel_points(&self, image_width: u32, image_height: u32) -> Vec<Point> {
        self.landmarks
            .iter()
            .map(|p| Point::new(p.x * image_width as f32, p.y * image_height as f32))
            .collect()
    }
}

/// Tracking region for the next frame, in source pixels.
///
/// The rectangle follows the wrist to middle-finger MCP axis, bounds the
/// palm and finger bases, moves 10% toward the fingers and doubles in size.
pub fn landmarks_to_roi(hand: &HandLandmarks, image_width: u32, image_height: u32) -> RotatedRect {
    let pts = hand.pixel_points(image_width, image_height);
    let rotation = rotation_to_vertical(pts[0], pts[9]);

    let subset: Vec<Point> = TRACKING_SUBSET.iter().map(|&i| pts[i]).collect();
    let (min_x, max_x, min_y, max_y) = subset.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |(a, b, c, d), p| (a.min(p.x), b.max(p.x), c.min(p.y), d.max(p.y)),
    );
    let axis_center = Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

    // Bound the points in the hand's own frame.
    let (sin, cos) = rotation.sin_cos();
    let (mut lo_x, mut hi_x, mut lo_y, mut hi_y) = (f32::MAX, f32::MIN, f32::MAX, f32::MIN);
    for p in &subset {
        let dx = p.x - axis_center.x;
        let dy = p.y - axis_center.y;
        let rx = dx * cos + dy * sin;
        let ry = -dx * sin + dy * cos;
        lo_x = lo_x.min(rx);
        hi_x = hi_x.max(rx);
        lo_y = lo_y.min(ry);
        hi_y = hi_y.max(ry);
    }
    let local_center = Point::new((lo_x + hi_x) / 2.0, (lo_y + hi_y) / 2.0);
    let center = Point::new(
        axis_center.x + local_center.x * cos - local_center.y * sin,
        axis_center.y + local_center.x * sin + local_center.y * cos,
    );

    let rect = RotatedRect::new(center.x, center.y, hi_x - lo_x, hi_y - lo_y, rotation);
    transform_rect(rect, 0.0, -0.1, 2.0, true)
}

fn pick<'a>(
    outputs: &'a [NamedOutput],
    count: usize,
    keyword: &str,
    fallback_rank: usize,
) -> Option<&'a NamedOutput> {
    let matching: Vec<&NamedOutput> = outputs
        .iter()
        .filter(|o| o.element_count() == count)
        .collect();
    matching
        .iter()
        .find(|o| o.name.to_ascii_lowercase().contains(keyword))
        .copied()
        .or_else(|| matching.get(fallback_rank).copied())
}

/// Decodes landmark model outputs for a crop taken with `transform`.
///
/// Returns `None` when the presence score is below `presence_threshold`.
pub fn decode_landmark_outputs(
    outputs: &[NamedOutput],
    transform: &RoiTransform,
    image_width: u32,
    image_height: u32,
    presence_threshold: f32,
) -> Result<Option<HandLandmarks>, DetectError> {
    let screen = pick(outputs, LANDMARK_VALUES, "screen", 0)
        .ok_or_else(|| DetectError::decode_error("landmark model has no 63-value output"))?;
    let world = pick(outputs, LANDMARK_VALUES, "world", 1)
        .filter(|w| w.name != screen.name)
        .ok_or_else(|| DetectError::decode_error("landmark model has no world landmark output"))?;
    let presence = pick(outputs, 1, "presence", 0)
        .ok_or_else(|| DetectError::decode_error("landmark model has no presence output"))?;
    let handedness = pick(outputs, 1, "handed", 1)
        .filter(|h| h.name != presence.name)
        .ok_or_else(|| DetectError::decode_error("landmark model has no handedness output"))?;

    let presence = as_probability(presence.data[0]);
    if presence < presence_threshold {
        return Ok(None);
    }
    let handedness_score = as_probability(handedness.data[0]);

    let (img_w, img_h) = (image_width.max(1) as f32, image_height.max(1) as f32);
    let z_scale = transform.scale_x() / img_w;
    let mut landmarks = [Point3::default(); NUM_HAND_LANDMARKS];
    for (i, lm) in landmarks.iter_mut().enumerate() {
        let raw = &screen.data[i * 3..i * 3 + 3];
        let p = transform.crop_to_image(Point::new(raw[0], raw[1]));
        *lm = Point3::new(p.x / img_w, p.y / img_h, raw[2] * z_scale);
    }

    let (sin, cos) = transform.rect.rotation.sin_cos();
    let mut world_points = [Point3::default(); NUM_HAND_LANDMARKS];
    for (i, wp) in world_points.iter_mut().enumerate() {
        let raw = &world.data[i * 3..i * 3 + 3];
        *wp = Point3::new(
            raw[0] * cos - raw[1] * sin,
            raw[0] * sin + raw[1] * cos,
            raw[2],
        );
    }

    Ok(Some(HandLandmarks {
        landmarks,
        world: world_points,
        handedness: Handedness::from_score(handedness_score),
        handedness_score,
        presence,
    }))
}

/// Hand landmark model.
pub struct HandLandmarker {
    inference: Box<dyn InferenceEngine>,
    normalizer: NormalizeImage,
    config: HandLandmarkerConfig,
}

impl std::fmt::Debug for HandLandmarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandLandmarker")
            .field("inference", &self.inference.name())
            .field("config", &self.config)
            .finish()
    }
}

impl HandLandmarker {
    pub fn new(inference: Box<dyn InferenceEngine>, config: HandLandmarkerConfig) -> Self {
        Self {
            inference,
            normalizer: NormalizeImage::for_unit_range(ChannelOrder::HWC),
            config,
        }
    }

    pub fn config(&self) -> &HandLandmarkerConfig {
        &self.config
    }

    /// Crops `roi` upright and converts it to the model input.
    pub fn preprocess(
        &self,
        image: &RgbImage,
        roi: &RotatedRect,
    ) -> Result<(Tensor4D, RoiTransform), DetectError> {
        let size = self.config.input_size;
        if !roi.is_valid() {
            return Err(DetectError::resize_error(
                "hand region warp",
                SimpleError::new(format!(
                    "degenerate region {}x{} at ({}, {})",
                    roi.width, roi.height, roi.cx, roi.cy
                )),
            ));
        }
        let (crop, transform) = warp_rotated_roi(image, roi, size, size);
        Ok((self.normalizer.normalize_to(&crop)?, transform))
    }

    pub fn infer(&self, tensor: &Tensor4D) -> Result<Vec<NamedOutput>, DetectError> {
        self.inference.infer(tensor).map_err(|e| {
            DetectError::model_inference_error(
                self.inference.name(),
                "forward",
                tensor.shape(),
                "hand landmark inference failed",
                e,
            )
        })
    }

    /// Runs the model on one hand region. `None` means no hand is present.
    pub fn detect(
        &self,
        image: &RgbImage,
        roi: &RotatedRect,
    ) -> Result<Option<HandLandmarks>, DetectError> {
        let (tensor, transform) = self.preprocess(image, roi)?;
        let outputs = self.infer(&tensor)?;
        decode_landmark_outputs(
            &outputs,
            &transform,
            image.width(),
            image.height(),
            self.config.presence_threshold,
        )
    }
}

/// Builder for [`HandLandmarker`].
#[derive(Debug, Default)]
pub struct HandLandmarkerBuilder {
    config: HandLandmarkerConfig,
    ort_config: Option<OrtSessionConfig>,
}

impl HandLandmarkerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: HandLandmarkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn presence_threshold(mut self, threshold: f32) -> Self {
        self.config.presence_threshold = threshold;
        self
    }

    pub fn with_ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    pub fn build(self, model_path: &Path) -> Result<HandLandmarker, DetectError> {
        self.config.validate()?;
        let inference = load_engine(model_path, self.ort_config.as_ref(), None)?;
        Ok(HandLandmarker::new(inference, self.config))
    }

    pub fn build_with_engine(
        self,
        inference: Box<dyn InferenceEngine>,
    ) -> Result<HandLandmarker, DetectError> {
        self.config.validate()?;
        Ok(HandLandmarker::new(inference, self.config))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::test_support::CannedEngine;

    /// Landmark model outputs placing every landmark on a vertical line through the crop.
    pub(crate) fn canned_outputs(presence_logit: f32) -> Vec<NamedOutput> {
        let mut screen = vec![0.0; LANDMARK_VALUES];
        for i in 0..NUM_HAND_LANDMARKS {
            screen[i * 3] = 112.0;
            screen[i * 3 + 1] = 200.0 - i as f32 * 8.0;
            screen[i * 3 + 2] = -1.0;
        }
        let world = vec![0.01; LANDMARK_VALUES];
        vec![
            NamedOutput::new("Identity", vec![1, 63], screen),
            NamedOutput::new("Identity_1", vec![1, 1], vec![presence_logit]),
            NamedOutput::new("Identity_2", vec![1, 1], vec![0.9]),
            NamedOutput::new("Identity_3", vec![1, 63], world),
        ]
    }

    fn sample_hand() -> HandLandmarks {
        let mut landmarks = [Point3::default(); NUM_HAND_LANDMARKS];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            lm.x = 0.5 + ((i % 3) as f32 - 1.0) * 0.03;
            lm.y = 0.7 - i as f32 * 0.02;
        }
        HandLandmarks {
            landmarks,
            world: [Point3::default(); NUM_HAND_LANDMARKS],
            handedness: Handedness::Right,
            handedness_score: 0.9,
            presence: 0.99,
        }
    }

    #[test]
    fn test_decode_maps_back_to_image() {
        let roi = RotatedRect::new(100.0, 100.0, 112.0, 112.0, 0.0);
        let transform = RoiTransform::new(roi, 224, 224);
        let hand = decode_landmark_outputs(&canned_outputs(5.0), &transform, 200, 200, 0.5)
            .unwrap()
            .unwrap();

        // Crop center maps to the ROI center; the crop is at half scale.
        assert!((hand.landmarks[0].x - 0.5).abs() < 1e-5);
        assert!((hand.landmarks[0].y - 0.72).abs() < 1e-5);
        assert!((hand.landmarks[0].z - (-0.5 / 200.0)).abs() < 1e-6);
        assert_eq!(hand.handedness, Handedness::Right);
        assert!(hand.presence > 0.99);
    }

    #[test]
    fn test_decode_low_presence_is_none() {
        let transform = RoiTransform::new(RotatedRect::new(50.0, 50.0, 50.0, 50.0, 0.0), 224, 224);
        let hand =
            decode_landmark_outputs(&canned_outputs(-5.0), &transform, 100, 100, 0.5).unwrap();
        assert!(hand.is_none());
    }

    #[test]
    fn test_decode_requires_outputs() {
        let transform = RoiTransform::new(RotatedRect::new(50.0, 50.0, 50.0, 50.0, 0.0), 224, 224);
        let outputs = vec![NamedOutput::new("Identity", vec![1, 63], vec![0.0; 63])];
        assert!(decode_landmark_outputs(&outputs, &transform, 100, 100, 0.5).is_err());
    }

    #[test]
    fn test_landmarks_to_roi_upright_hand() {
        let hand = sample_hand();
        let roi = landmarks_to_roi(&hand, 100, 100);

        // Wrist at the bottom, middle MCP above it: nearly upright.
        assert!(roi.rotation.abs() < 0.3);
        assert!((roi.width - roi.height).abs() < 1e-4);
        assert!(roi.width > 0.0);
    }

    #[test]
    fn test_detect_with_canned_engine() {
        let engine = CannedEngine::new("landmarks", vec!["input_1"], canned_outputs(3.0));
        let landmarker = HandLandmarkerBuilder::new()
            .build_with_engine(Box::new(engine))
            .unwrap();

        let image = RgbImage::new(320, 240);
        let roi = RotatedRect::new(160.0, 120.0, 100.0, 100.0, 0.3);
        let hand = landmarker.detect(&image, &roi).unwrap().unwrap();
        assert_eq!(hand.landmarks.len(), NUM_HAND_LANDMARKS);
    }

    #[test]
    fn test_degenerate_region_is_rejected() {
        let engine = CannedEngine::new("landmarks", vec!["input_1"], canned_outputs(3.0));
        let landmarker = HandLandmarkerBuilder::new()
            .build_with_engine(Box::new(engine))
            .unwrap();

        let roi = RotatedRect::new(10.0, 10.0, 0.0, 0.0, 0.0);
        assert!(landmarker.detect(&RgbImage::new(32, 32), &roi).is_err());
    }
}
