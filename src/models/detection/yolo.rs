//! YOLO11 person detection.
//!
//! Works with Ultralytics ONNX exports (`yolo export model=yolo11n.pt format=onnx`),
//! whose single output holds `4 + nc` rows per candidate: box center, size and
//! one score per class.

use crate::core::config::{ConfigError, ConfigValidator, OrtSessionConfig};
use crate::core::inference::InferenceEngine;
use crate::core::{DetectError, NamedOutput, Tensor4D};
use crate::models::load_engine;
use crate::processors::{
    BBox, ChannelOrder, Letterbox, LetterboxInfo, NormalizeImage, class_aware_nms,
};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Class id of `person` in COCO.
pub const PERSON_CLASS_ID: usize = 0;

/// Letterbox fill used by Ultralytics.
pub const YOLO_PAD_VALUE: u8 = 114;

/// The 80 COCO class names in model order.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Configuration for the YOLO detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoloConfig {
    /// Model input size as `(width, height)`
    pub input_size: (u32, u32),
    /// Minimum class score for a candidate
    pub score_threshold: f32,
    /// IoU above which same-class boxes are suppressed
    pub iou_threshold: f32,
    /// Maximum detections kept per image
    pub max_detections: usize,
    /// Classes to keep; `None` keeps every class
    pub class_filter: Option<Vec<usize>>,
    /// Class names in model order
    pub class_names: Vec<String>,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            input_size: (640, 640),
            score_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 100,
            class_filter: Some(vec![PERSON_CLASS_ID]),
            class_names: COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ConfigValidator for YoloConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_unit_interval("score_threshold", self.score_threshold)?;
        self.validate_unit_interval("iou_threshold", self.iou_threshold)?;
        self.validate_positive("input_size.width", self.input_size.0 as i64)?;
        self.validate_positive("input_size.height", self.input_size.1 as i64)?;
        self.validate_positive("max_detections", self.max_detections as i64)?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// A detected object in source image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub score: f32,
    pub class_id: usize,
    pub label: String,
}

/// Decodes a raw YOLO output into detections in source image coordinates.
///
/// Accepts `[1, 4 + nc, N]` as well as the transposed `[1, N, 4 + nc]`.
pub fn decode_yolo_output(
    output: &NamedOutput,
    letterbox: &LetterboxInfo,
    config: &YoloConfig,
) -> Result<Vec<Detection>, DetectError> {
    DetectError::ensure_rank("yolo", &output.shape, 3)?;
    let (d1, d2) = (output.shape[1], output.shape[2]);
    if output.data.len() < d1 * d2 {
        return Err(DetectError::decode_error(format!(
            "yolo output '{}' holds {} values, shape {:?} needs {}",
            output.name,
            output.data.len(),
            output.shape,
            d1 * d2
        )));
    }

    let expected_attrs = config.class_names.len() + 4;
    let attrs_first = if d1 == expected_attrs && d2 != expected_attrs {
        true
    } else if d2 == expected_attrs && d1 != expected_attrs {
        false
    } else {
        d1 < d2
    };
    let (attrs, candidates) = if attrs_first { (d1, d2) } else { (d2, d1) };
    if attrs < 5 {
        return Err(DetectError::decode_error(format!(
            "yolo output shape {:?} has no class scores",
            output.shape
        )));
    }
    let num_classes = attrs - 4;

    let data = &output.data;
    let value = |attr: usize, i: usize| -> f32 {
        if attrs_first {
            data[attr * candidates + i]
        } else {
            data[i * attrs + attr]
        }
    };

    let src_w = letterbox.src_width as f32;
    let src_h = letterbox.src_height as f32;
    let mut boxes = Vec::new();
    let mut scores = Vec::new();
    let mut classes = Vec::new();

    for i in 0..candidates {
        let mut best_class = 0;
        let mut best_score = f32::NEG_INFINITY;
        for c in 0..num_classes {
            let s = value(4 + c, i);
            if s > best_score {
                best_score = s;
                best_class = c;
            }
        }

        if best_score < config.score_threshold {
            continue;
        }
        if let Some(filter) = &config.class_filter
            && !filter.contains(&best_class)
        {
            continue;
        }

        let model_box = BBox::from_center(value(0, i), value(1, i), value(2, i), value(3, i));
        let bbox = letterbox.unmap_box(&model_box).clamp(src_w, src_h);
        if !bbox.is_valid() {
            continue;
        }

        boxes.push(bbox);
        scores.push(best_score);
        classes.push(best_class);
    }

    let keep = class_aware_nms(
        &boxes,
        &scores,
        &classes,
        config.iou_threshold,
        config.max_detections,
    );

    Ok(keep
        .into_iter()
        .map(|idx| {
            let class_id = classes[idx];
            Detection {
                bbox: boxes[idx],
                score: scores[idx],
                class_id,
                label: config
                    .class_names
                    .get(class_id)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{class_id}")),
            }
        })
        .collect())
}

/// YOLO detector: letterbox, inference and decoding.
pub struct YoloModel {
    inference: Box<dyn InferenceEngine>,
    letterbox: Letterbox,
    normalizer: NormalizeImage,
    config: YoloConfig,
}

impl std::fmt::Debug for YoloModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloModel")
            .field("inference", &self.inference.name())
            .field("config", &self.config)
            .finish()
    }
}

impl YoloModel {
    pub fn new(inference: Box<dyn InferenceEngine>, config: YoloConfig) -> Self {
        let (w, h) = config.input_size;
        Self {
            inference,
            letterbox: Letterbox::new(w, h, YOLO_PAD_VALUE),
            normalizer: NormalizeImage::for_unit_range(ChannelOrder::CHW),
            config,
        }
    }

    pub fn config(&self) -> &YoloConfig {
        &self.config
    }

    /// Letterboxes and normalizes an image.
    pub fn preprocess(&self, image: &RgbImage) -> Result<(Tensor4D, LetterboxInfo), DetectError> {
        let (canvas, info) = self.letterbox.apply(image);
        let tensor = self.normalizer.normalize_to(&canvas)?;
        Ok((tensor, info))
    }

    /// Runs the model.
    pub fn infer(&self, tensor: &Tensor4D) -> Result<Vec<NamedOutput>, DetectError> {
        self.inference.infer(tensor).map_err(|e| {
            DetectError::model_inference_error(
                self.inference.name(),
                "forward",
                tensor.shape(),
                "YOLO inference failed",
                e,
            )
        })
    }

    /// Decodes the first model output.
    pub fn postprocess(
        &self,
        outputs: &[NamedOutput],
        info: &LetterboxInfo,
    ) -> Result<Vec<Detection>, DetectError> {
        let output = outputs
            .first()
            .ok_or_else(|| DetectError::decode_error("yolo model produced no outputs"))?;
        decode_yolo_output(output, info, &self.config)
    }

    /// Runs the complete forward pass: preprocess -> infer -> postprocess.
    pub fn forward(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectError> {
        let (tensor, info) = self.preprocess(image)?;
        let outputs = self.infer(&tensor)?;
        let detections = self.postprocess(&outputs, &info)?;
        debug!(
            "YOLO: {} detections on {}x{} image",
            detections.len(),
            image.width(),
            image.height()
        );
        Ok(detections)
    }
}

/// Builder for [`YoloModel`].
#[derive(Debug, Default)]
pub struct YoloModelBuilder {
    config: YoloConfig,
    ort_config: Option<OrtSessionConfig>,
}

impl YoloModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: YoloConfig) -> Self {
        self.config = config;
        self
    }

    pub fn input_size(mut self, width: u32, height: u32) -> Self {
        self.config.input_size = (width, height);
        self
    }

    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.config.score_threshold = threshold;
        self
    }

    /// Sets the ONNX Runtime session configuration.
    pub fn with_ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    /// Loads the ONNX model and builds the detector.
    pub fn build(self, model_path: &Path) -> Result<YoloModel, DetectError> {
        self.config.validate()?;
        let inference = load_engine(model_path, self.ort_config.as_ref(), Some("images"))?;
        Ok(YoloModel::new(inference, self.config))
    }

    /// Builds the detector around an existing engine.
    pub fn build_with_engine(
        self,
        inference: Box<dyn InferenceEngine>,
    ) -> Result<YoloModel, DetectError> {
        self.config.validate()?;
        Ok(YoloModel::new(inference, self.config))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::test_support::CannedEngine;

    fn identity_letterbox(w: u32, h: u32) -> LetterboxInfo {
        Letterbox::new(w, h, YOLO_PAD_VALUE).info_for(w, h)
    }

    /// Builds a `[1, 4 + nc, n]` output from `(cx, cy, w, h, class, score)` rows.
    pub(crate) fn attrs_first(
        nc: usize,
        rows: &[(f32, f32, f32, f32, usize, f32)],
    ) -> NamedOutput {
        let n = rows.len();
        let attrs = 4 + nc;
        let mut data = vec![0.0; attrs * n];
        for (i, &(cx, cy, w, h, class, score)) in rows.iter().enumerate() {
            data[i] = cx;
            data[n + i] = cy;
            data[2 * n + i] = w;
            data[3 * n + i] = h;
            data[(4 + class) * n + i] = score;
        }
        NamedOutput::new("output0", vec![1, attrs, n], data)
    }

    fn transpose(out: &NamedOutput) -> NamedOutput {
        let (attrs, n) = (out.shape[1], out.shape[2]);
        let mut data = vec![0.0; attrs * n];
        for a in 0..attrs {
            for i in 0..n {
                data[i * attrs + a] = out.data[a * n + i];
            }
        }
        NamedOutput::new(out.name.clone(), vec![1, n, attrs], data)
    }

    #[test]
    fn test_decode_keeps_people_only() {
        let config = YoloConfig::default();
        let out = attrs_first(
            80,
            &[
                (100.0, 100.0, 50.0, 100.0, 0, 0.9),
                (300.0, 300.0, 40.0, 40.0, 2, 0.95),
                (500.0, 100.0, 30.0, 30.0, 0, 0.2),
            ],
        );
        let dets = decode_yolo_output(&out, &identity_letterbox(640, 640), &config).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "person");
        assert_eq!(dets[0].bbox, BBox::new(75.0, 50.0, 125.0, 150.0));
    }

    #[test]
    fn test_decode_transposed_layout() {
        let config = YoloConfig::default();
        let out = attrs_first(80, &[(320.0, 320.0, 64.0, 64.0, 0, 0.8)]);
        let a = decode_yolo_output(&out, &identity_letterbox(640, 640), &config).unwrap();
        let b =
            decode_yolo_output(&transpose(&out), &identity_letterbox(640, 640), &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_decode_applies_nms_and_letterbox() {
        let config = YoloConfig::default();
        // 1280x720 source in a 640x640 canvas: scale 0.5, 140 px vertical padding.
        let info = Letterbox::new(640, 640, YOLO_PAD_VALUE).info_for(1280, 720);
        let out = attrs_first(
            80,
            &[
                (320.0, 320.0, 100.0, 200.0, 0, 0.9),
                (322.0, 321.0, 100.0, 200.0, 0, 0.85),
            ],
        );
        let dets = decode_yolo_output(&out, &info, &config).unwrap();
        assert_eq!(dets.len(), 1);
        assert!((dets[0].score - 0.9).abs() < 1e-6);
        let b = dets[0].bbox;
        assert!((b.x1 - 540.0).abs() < 1e-3);
        assert!((b.y1 - 160.0).abs() < 1e-3);
        assert!((b.x2 - 740.0).abs() < 1e-3);
        assert!((b.y2 - 560.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_drops_boxes_outside_image() {
        let config = YoloConfig::default();
        let out = attrs_first(80, &[(-100.0, -100.0, 20.0, 20.0, 0, 0.9)]);
        let dets = decode_yolo_output(&out, &identity_letterbox(640, 640), &config).unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_rank() {
        let out = NamedOutput::new("output0", vec![84, 10], vec![0.0; 840]);
        let config = YoloConfig::default();
        assert!(decode_yolo_output(&out, &identity_letterbox(640, 640), &config).is_err());
    }

    #[test]
    fn test_forward_with_canned_engine() {
        let out = attrs_first(80, &[(320.0, 320.0, 64.0, 128.0, 0, 0.7)]);
        let engine = CannedEngine::new("yolo", vec!["images"], vec![out]);
        let model = YoloModelBuilder::new()
            .build_with_engine(Box::new(engine))
            .unwrap();

        let image = RgbImage::new(640, 640);
        let dets = model.forward(&image).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, PERSON_CLASS_ID);
    }

    #[test]
    fn test_config_validation() {
        assert!(YoloConfig::default().validate().is_ok());
        let bad = YoloConfig {
            iou_threshold: 1.2,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(
            YoloModelBuilder::new()
                .score_threshold(-0.1)
                .build(Path::new("missing.onnx"))
                .is_err()
        );
    }
}
