//! Palm detection with the MediaPipe SSD palm detector.
//!
//! The model sees a 192x192 letterboxed image and emits, for each of its 2016
//! anchors, one score logit and 18 regressors: box center offset, box size and
//! seven palm keypoints, all in model pixels relative to the anchor.

use super::{rotation_to_vertical, sigmoid, transform_rect};
use crate::core::config::{ConfigError, ConfigValidator, OrtSessionConfig};
use crate::core::inference::InferenceEngine;
use crate::core::tensor::find_by_last_dim;
use crate::core::{DetectError, NamedOutput, Tensor4D};
use crate::models::load_engine;
use crate::processors::{
    Anchor, BBox, ChannelOrder, Letterbox, LetterboxInfo, NormalizeImage, Point, RotatedRect,
    ScoredRegion, SsdAnchorOptions, generate_anchors, weighted_nms,
};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Number of palm keypoints.
pub const NUM_PALM_KEYPOINTS: usize = 7;
/// Regressor values per anchor: box (4) plus keypoints (2 each).
pub const NUM_PALM_REGRESSORS: usize = 4 + 2 * NUM_PALM_KEYPOINTS;

/// Wrist keypoint index.
pub const WRIST_KEYPOINT: usize = 0;
/// Middle finger MCP keypoint index.
pub const MIDDLE_MCP_KEYPOINT: usize = 2;

/// Configuration for the palm detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PalmDetectorConfig {
    /// Square model input size
    pub input_size: u32,
    /// Minimum sigmoid score for a palm
    pub score_threshold: f32,
    /// IoU above which palms are merged
    pub nms_threshold: f32,
    /// Maximum palms returned
    pub max_hands: usize,
    /// Anchor grid
    pub anchors: SsdAnchorOptions,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 192,
            score_threshold: 0.5,
            nms_threshold: 0.3,
            max_hands: 2,
            anchors: SsdAnchorOptions::default(),
        }
    }
}

impl ConfigValidator for PalmDetectorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_unit_interval("score_threshold", self.score_threshold)?;
        self.validate_unit_interval("nms_threshold", self.nms_threshold)?;
        self.validate_positive("input_size", self.input_size as i64)?;
        self.validate_positive("max_hands", self.max_hands as i64)?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// A detected palm, normalized to the source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalmDetection {
    pub bbox: BBox,
    pub score: f32,
    pub keypoints: [Point; NUM_PALM_KEYPOINTS],
}

/// Decodes raw palm detector outputs.
///
/// `regressors` is `[1, N, 18]`, `scores` is `[1, N, 1]`, with `N` equal to
/// the anchor count. Results are normalized to the source image.
pub fn decode_palm_outputs(
    regressors: &NamedOutput,
    scores: &NamedOutput,
    anchors: &[Anchor],
    letterbox: &LetterboxInfo,
    config: &PalmDetectorConfig,
) -> Result<Vec<PalmDetection>, DetectError> {
    let n = anchors.len();
    if regressors.data.len() < n * NUM_PALM_REGRESSORS || scores.data.len() < n {
        return Err(DetectError::decode_error(format!(
            "palm outputs {:?} / {:?} do not cover {} anchors",
            regressors.shape, scores.shape, n
        )));
    }

    let size = config.input_size as f32;
    let mut candidates = Vec::new();
    for (i, anchor) in anchors.iter().enumerate() {
        let score = sigmoid(scores.data[i]);
        if score < config.score_threshold {
            continue;
        }

        let raw = &regressors.data[i * NUM_PALM_REGRESSORS..(i + 1) * NUM_PALM_REGRESSORS];
        let cx = raw[0] / size * anchor.width + anchor.x_center;
        let cy = raw[1] / size * anchor.height + anchor.y_center;
        let w = raw[2] / size * anchor.width;
        let h = raw[3] / size * anchor.height;

        let keypoints = (0..NUM_PALM_KEYPOINTS)
            .map(|k| {
                Point::new(
                    raw[4 + 2 * k] / size * anchor.width + anchor.x_center,
                    raw[5 + 2 * k] / size * anchor.height + anchor.y_center,
                )
            })
            .collect();

        candidates.push(ScoredRegion {
            bbox: BBox::from_center(cx, cy, w, h),
            keypoints,
            score,
        });
    }

    let merged = weighted_nms(&candidates, config.nms_threshold, config.max_hands);

    Ok(merged
        .into_iter()
        .filter_map(|region| {
            let tl = letterbox.unmap_normalized(Point::new(region.bbox.x1, region.bbox.y1));
            let br = letterbox.unmap_normalized(Point::new(region.bbox.x2, region.bbox.y2));
            let mut keypoints = [Point::default(); NUM_PALM_KEYPOINTS];
            for (dst, src) in keypoints.iter_mut().zip(&region.keypoints) {
                *dst = letterbox.unmap_normalized(*src);
            }
            let bbox = BBox::new(tl.x, tl.y, br.x, br.y);
            bbox.is_valid().then_some(PalmDetection {
                bbox,
                score: region.score,
                keypoints,
            })
        })
        .collect())
}

/// Hand region for the landmark model, in source pixels.
///
/// The rectangle is rotated so the wrist to middle-finger axis points up,
/// moved half a box toward the fingers, squared and enlarged 2.6 times.
pub fn palm_to_roi(palm: &PalmDetection, image_width: u32, image_height: u32) -> RotatedRect {
    let (w, h) = (image_width as f32, image_height as f32);
    let to_px = |p: Point| Point::new(p.x * w, p.y * h);

    let rotation = rotation_to_vertical(
        to_px(palm.keypoints[WRIST_KEYPOINT]),
        to_px(palm.keypoints[MIDDLE_MCP_KEYPOINT]),
    );
    let center = to_px(palm.bbox.center());
    let rect = RotatedRect::new(
        center.x,
        center.y,
        palm.bbox.width() * w,
        palm.bbox.height() * h,
        rotation,
    );
    transform_rect(rect, 0.0, -0.5, 2.6, true)
}

/// Palm detector model.
pub struct PalmDetector {
    inference: Box<dyn InferenceEngine>,
    letterbox: Letterbox,
    normalizer: NormalizeImage,
    anchors: Vec<Anchor>,
    config: PalmDetectorConfig,
}

impl std::fmt::Debug for PalmDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PalmDetector")
            .field("inference", &self.inference.name())
            .field("anchors", &self.anchors.len())
            .field("config", &self.config)
            .finish()
    }
}

impl PalmDetector {
    pub fn new(inference: Box<dyn InferenceEngine>, config: PalmDetectorConfig) -> Self {
        let anchors = generate_anchors(&config.anchors);
        Self {
            inference,
            letterbox: Letterbox::new(config.input_size, config.input_size, 0),
            normalizer: NormalizeImage::for_unit_range(ChannelOrder::HWC),
            anchors,
            config,
        }
    }

    pub fn config(&self) -> &PalmDetectorConfig {
        &self.config
    }

    pub fn preprocess(&self, image: &RgbImage) -> Result<(Tensor4D, LetterboxInfo), DetectError> {
        let (canvas, info) = self.letterbox.apply(image);
        Ok((self.normalizer.normalize_to(&canvas)?, info))
    }

    pub fn infer(&self, tensor: &Tensor4D) -> Result<Vec<NamedOutput>, DetectError> {
        self.inference.infer(tensor).map_err(|e| {
            DetectError::model_inference_error(
                self.inference.name(),
                "forward",
                tensor.shape(),
                "palm detection failed",
                e,
            )
        })
    }

    /// Picks the regressor and score outputs by their last dimension.
    pub fn postprocess(
        &self,
        outputs: &[NamedOutput],
        info: &LetterboxInfo,
    ) -> Result<Vec<PalmDetection>, DetectError> {
        let regressors = find_by_last_dim(outputs, NUM_PALM_REGRESSORS).ok_or_else(|| {
            DetectError::decode_error("palm detector has no [1, N, 18] regressor output")
        })?;
        let scores = find_by_last_dim(outputs, 1)
            .ok_or_else(|| DetectError::decode_error("palm detector has no [1, N, 1] score output"))?;
        decode_palm_outputs(regressors, scores, &self.anchors, info, &self.config)
    }

    /// Detects palms, normalized to `image`.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<PalmDetection>, DetectError> {
        let (tensor, info) = self.preprocess(image)?;
        let outputs = self.infer(&tensor)?;
        let palms = self.postprocess(&outputs, &info)?;
        debug!("Palm detector: {} palms", palms.len());
        Ok(palms)
    }
}

/// Builder for [`PalmDetector`].
#[derive(Debug, Default)]
pub struct PalmDetectorBuilder {
    config: PalmDetectorConfig,
    ort_config: Option<OrtSessionConfig>,
}

impl PalmDetectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PalmDetectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.config.score_threshold = threshold;
        self
    }

    pub fn nms_threshold(mut self, threshold: f32) -> Self {
        self.config.nms_threshold = threshold;
        self
    }

    pub fn max_hands(mut self, max_hands: usize) -> Self {
        self.config.max_hands = max_hands;
        self
    }

    pub fn with_ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    pub fn build(self, model_path: &Path) -> Result<PalmDetector, DetectError> {
        self.config.validate()?;
        let inference = load_engine(model_path, self.ort_config.as_ref(), None)?;
        Ok(PalmDetector::new(inference, self.config))
    }

    pub fn build_with_engine(
        self,
        inference: Box<dyn InferenceEngine>,
    ) -> Result<PalmDetector, DetectError> {
        self.config.validate()?;
        Ok(PalmDetector::new(inference, self.config))
    }
}
