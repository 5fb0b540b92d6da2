//! Gesture recognition from hand landmarks.
//!
//! Two models run back to back: the embedder turns landmarks and handedness
//! into a 128-value embedding and the canned classifier scores it against
//! the eight built-in gestures.

use super::NUM_HAND_LANDMARKS;
use super::landmark::HandLandmarks;
use crate::core::config::{ConfigError, ConfigValidator, OrtSessionConfig};
use crate::core::inference::InferenceEngine;
use crate::core::{DetectError, NamedOutput, SimpleError, Tensor2D, Tensor3D};
use crate::models::load_engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Size of the gesture embedding.
pub const EMBEDDING_SIZE: usize = 128;

/// Classifier labels in output order.
pub const GESTURE_LABELS: [&str; 8] = [
    "None",
    "Closed_Fist",
    "Open_Palm",
    "Pointing_Up",
    "Thumb_Down",
    "Thumb_Up",
    "Victory",
    "ILoveYou",
];

/// Canned gestures known to the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gesture {
    #[default]
    None,
    #[serde(rename = "Closed_Fist")]
    ClosedFist,
    #[serde(rename = "Open_Palm")]
    OpenPalm,
    #[serde(rename = "Pointing_Up")]
    PointingUp,
    #[serde(rename = "Thumb_Down")]
    ThumbDown,
    #[serde(rename = "Thumb_Up")]
    ThumbUp,
    Victory,
    ILoveYou,
}

impl Gesture {
    pub const ALL: [Gesture; 8] = [
        Gesture::None,
        Gesture::ClosedFist,
        Gesture::OpenPalm,
        Gesture::PointingUp,
        Gesture::ThumbDown,
        Gesture::ThumbUp,
        Gesture::Victory,
        Gesture::ILoveYou,
    ];

    /// Gesture for a classifier output index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(&self) -> &'static str {
        GESTURE_LABELS[*self as usize]
    }
}

impl std::fmt::Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gesture {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GESTURE_LABELS
            .iter()
            .position(|label| label.eq_ignore_ascii_case(s))
            .and_then(Gesture::from_index)
            .ok_or_else(|| DetectError::invalid_input(format!("unknown gesture '{}'", s)))
    }
}

/// Configuration for gesture recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Minimum classifier score for a gesture other than `None`
    pub score_threshold: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
        }
    }
}

impl ConfigValidator for GestureConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_unit_interval("score_threshold", self.score_threshold)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Result of classifying one hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GesturePrediction {
    pub gesture: Gesture,
    /// Score of `gesture`, or of the best label when it fell below the threshold
    pub score: f32,
    /// Probabilities for every label in [`GESTURE_LABELS`] order
    pub scores: Vec<f32>,
}

/// Landmarks normalized to the hand itself: centered on 0.5 with the longer
/// side of the bounding box spanning 1.0, measured in pixel aspect.
pub fn normalize_hand_landmarks(
    hand: &HandLandmarks,
    image_width: u32,
    image_height: u32,
) -> [[f32; 3]; NUM_HAND_LANDMARKS] {
    let (w, h) = (image_width.max(1) as f32, image_height.max(1) as f32);
    let px: Vec<[f32; 3]> = hand
        .landmarks
        .iter()
        .map(|p| [p.x * w, p.y * h, p.z * w])
        .collect();

    let (min_x, max_x, min_y, max_y) = px.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |(a, b, c, d), p| (a.min(p[0]), b.max(p[0]), c.min(p[1]), d.max(p[1])),
    );
    let side = (max_x - min_x).max(max_y - min_y);
    let scale = if side > f32::EPSILON { 1.0 / side } else { 1.0 };
    let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

    let mut out = [[0.0; 3]; NUM_HAND_LANDMARKS];
    for (dst, p) in out.iter_mut().zip(&px) {
        *dst = [
            (p[0] - cx) * scale + 0.5,
            (p[1] - cy) * scale + 0.5,
            p[2] * scale,
        ];
    }
    out
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::MIN, f32::max);
    let exp: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|v| v / sum.max(f32::EPSILON)).collect()
}

/// Turns classifier output into probabilities, applying softmax to logits.
pub fn gesture_probabilities(raw: &[f32]) -> Vec<f32> {
    let sum: f32 = raw.iter().sum();
    if raw.iter().all(|v| *v >= 0.0) && (sum - 1.0).abs() < 1e-3 {
        raw.to_vec()
    } else {
        softmax(raw)
    }
}

/// Picks the winning gesture from classifier scores.
pub fn classify_scores(raw: &[f32], score_threshold: f32) -> Result<GesturePrediction, DetectError> {
    if raw.len() != GESTURE_LABELS.len() {
        return Err(DetectError::decode_error(format!(
            "gesture classifier returned {} scores, expected {}",
            raw.len(),
            GESTURE_LABELS.len()
        )));
    }
    if raw.iter().any(|v| !v.is_finite()) {
        return Err(DetectError::post_processing(
            "gesture classification",
            SimpleError::new(format!("non-finite classifier scores {:?}", raw)),
        ));
    }
    let scores = gesture_probabilities(raw);
    let (best, score) = scores
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::MIN), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });

    let gesture = match Gesture::from_index(best) {
        Some(g) if score >= score_threshold => g,
        _ => Gesture::None,
    };
    Ok(GesturePrediction {
        gesture,
        score,
        scores,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EmbedderInput {
    Landmarks,
    Handedness,
    World,
}

/// Assigns embedder input names to their tensors, by name where possible.
fn assign_embedder_inputs(names: &[String]) -> Result<Vec<(String, EmbedderInput)>, DetectError> {
    if names.len() != 3 {
        return Err(DetectError::invalid_input(format!(
            "gesture embedder expects 3 inputs, model declares {}",
            names.len()
        )));
    }
    let by_name = |name: &str| {
        let lower = name.to_ascii_lowercase();
        if lower.contains("world") {
            Some(EmbedderInput::World)
        } else if lower.contains("handed") {
            Some(EmbedderInput::Handedness)
        } else if lower.contains("hand") {
            Some(EmbedderInput::Landmarks)
        } else {
            None
        }
    };

    let order = [
        EmbedderInput::Landmarks,
        EmbedderInput::Handedness,
        EmbedderInput::World,
    ];
    let named: Vec<Option<EmbedderInput>> = names.iter().map(|n| by_name(n)).collect();
    // Name matching only applies when every kind is claimed exactly once.
    let distinct = order
        .iter()
        .all(|kind| named.iter().filter(|n| **n == Some(*kind)).count() == 1);

    Ok(names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let kind = if distinct {
                named[i].unwrap_or(order[i])
            } else {
                order[i]
            };
            (name.clone(), kind)
        })
        .collect())
}

/// Gesture embedder plus classifier.
pub struct GestureRecognizer {
    embedder: Box<dyn InferenceEngine>,
    classifier: Box<dyn InferenceEngine>,
    config: GestureConfig,
}

impl std::fmt::Debug for GestureRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureRecognizer")
            .field("embedder", &self.embedder.name())
            .field("classifier", &self.classifier.name())
            .field("config", &self.config)
            .finish()
    }
}

impl GestureRecognizer {
    pub fn new(
        embedder: Box<dyn InferenceEngine>,
        classifier: Box<dyn InferenceEngine>,
        config: GestureConfig,
    ) -> Self {
        Self {
            embedder,
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Computes the gesture embedding for one hand.
    pub fn embed(
        &self,
        hand: &HandLandmarks,
        image_width: u32,
        image_height: u32,
    ) -> Result<Vec<f32>, DetectError> {
        let normalized = normalize_hand_landmarks(hand, image_width, image_height);
        let landmarks = Tensor3D::from_shape_fn((1, NUM_HAND_LANDMARKS, 3), |(_, i, c)| {
            normalized[i][c]
        });
        let world = Tensor3D::from_shape_fn((1, NUM_HAND_LANDMARKS, 3), |(_, i, c)| {
            let p = hand.world[i];
            [p.x, p.y, p.z][c]
        });
        let handedness = Tensor2D::from_elem((1, 1), hand.handedness_score);

        let assignment = assign_embedder_inputs(&self.embedder.input_names())?;
        let inputs: Vec<(&str, ndarray::ArrayViewD<'_, f32>)> = assignment
            .iter()
            .map(|(name, kind)| {
                let view = match kind {
                    EmbedderInput::Landmarks => landmarks.view().into_dyn(),
                    EmbedderInput::Handedness => handedness.view().into_dyn(),
                    EmbedderInput::World => world.view().into_dyn(),
                };
                (name.as_str(), view)
            })
            .collect();

        let outputs = self.embedder.run(&inputs).map_err(|e| {
            DetectError::model_inference_error(
                self.embedder.name(),
                "embed",
                &[1, NUM_HAND_LANDMARKS, 3],
                "gesture embedding failed",
                e,
            )
        })?;
        let embedding = outputs
            .into_iter()
            .next()
            .ok_or_else(|| DetectError::decode_error("gesture embedder returned no outputs"))?;
        if embedding.element_count() != EMBEDDING_SIZE {
            return Err(DetectError::decode_error(format!(
                "gesture embedding has shape {:?}, expected [1, {}]",
                embedding.shape, EMBEDDING_SIZE
            )));
        }
        Ok(embedding.data)
    }

    /// Scores an embedding against the canned gestures.
    pub fn classify(&self, embedding: &[f32]) -> Result<GesturePrediction, DetectError> {
        let input = Tensor2D::from_shape_vec((1, embedding.len()), embedding.to_vec())?;
        let name = self
            .classifier
            .input_names()
            .into_iter()
            .next()
            .unwrap_or_else(|| "embedding".to_string());
        let outputs: Vec<NamedOutput> = self
            .classifier
            .run(&[(name.as_str(), input.view().into_dyn())])
            .map_err(|e| {
                DetectError::model_inference_error(
                    self.classifier.name(),
                    "classify",
                    input.shape(),
                    "gesture classification failed",
                    e,
                )
            })?;
        let scores = outputs
            .first()
            .ok_or_else(|| DetectError::decode_error("gesture classifier returned no outputs"))?;
        let prediction = classify_scores(&scores.data, self.config.score_threshold)?;
        debug!(
            "gesture {} (score {:.3})",
            prediction.gesture, prediction.score
        );
        Ok(prediction)
    }

    /// Recognizes the gesture of one hand.
    pub fn recognize(
        &self,
        hand: &HandLandmarks,
        image_width: u32,
        image_height: u32,
    ) -> Result<GesturePrediction, DetectError> {
        let embedding = self.embed(hand, image_width, image_height)?;
        self.classify(&embedding)
    }
}

/// Builder for [`GestureRecognizer`].
#[derive(Debug, Default)]
pub struct GestureRecognizerBuilder {
    config: GestureConfig,
    ort_config: Option<OrtSessionConfig>,
}

impl GestureRecognizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: GestureConfig) -> Self {
        self.config = config;
        self
    }

    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.config.score_threshold = threshold;
        self
    }

    pub fn with_ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    pub fn build(
        self,
        embedder_path: &Path,
        classifier_path: &Path,
    ) -> Result<GestureRecognizer, DetectError> {
        self.config.validate()?;
        let embedder = load_engine(embedder_path, self.ort_config.as_ref(), None)?;
        let classifier = load_engine(classifier_path, self.ort_config.as_ref(), None)?;
        Ok(GestureRecognizer::new(embedder, classifier, self.config))
    }

    pub fn build_with_engines(
        self,
        embedder: Box<dyn InferenceEngine>,
        classifier: Box<dyn InferenceEngine>,
    ) -> Result<GestureRecognizer, DetectError> {
        self.config.validate()?;
        Ok(GestureRecognizer::new(embedder, classifier, self.config))
    }
}
