//! Person and hand detection over a frame stream.

use super::{FrameResult, HandResult, PipelineStats};
use crate::config::AppConfig;
use crate::core::errors::DetectResult;
use crate::models::{
    GestureRecognizer, GestureRecognizerBuilder, HandLandmarker, HandLandmarkerBuilder,
    PalmDetector, PalmDetectorBuilder, YoloModel, YoloModelBuilder, landmarks_to_roi, palm_to_roi,
};
use crate::processors::{Point, RotatedRect};
use crate::video::{Frame, FrameSource};
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs YOLO for people and the MediaPipe hand models for hands.
///
/// Hands found in one frame are tracked into the next through their landmark
/// regions, so palm detection only runs while fewer than `max_hands` hands
/// are tracked.
pub struct HumanHandPipeline {
    people: YoloModel,
    palms: PalmDetector,
    landmarker: HandLandmarker,
    gestures: GestureRecognizer,
    max_hands: usize,
    tracked: Vec<RotatedRect>,
    next_index: u64,
}

impl std::fmt::Debug for HumanHandPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HumanHandPipeline")
            .field("people", &self.people)
            .field("palms", &self.palms)
            .field("landmarker", &self.landmarker)
            .field("gestures", &self.gestures)
            .field("max_hands", &self.max_hands)
            .field("tracked", &self.tracked.len())
            .finish()
    }
}

impl HumanHandPipeline {
    /// Loads every model named in `config`.
    pub fn from_config(config: &AppConfig) -> DetectResult<Self> {
        let (w, h) = config.yolo_input_size();
        let mut yolo = YoloModelBuilder::new()
            .input_size(w, h)
            .score_threshold(config.yolo_threshold());
        let mut palm = PalmDetectorBuilder::new()
            .score_threshold(config.hand_detection_threshold())
            .nms_threshold(config.hands_nms_threshold())
            .max_hands(config.maximum_hands());
        let mut landmark =
            HandLandmarkerBuilder::new().presence_threshold(config.hand_presence_threshold());
        let mut gesture =
            GestureRecognizerBuilder::new().score_threshold(config.gesture_threshold());

        if let Some(ort) = config.ort() {
            yolo = yolo.with_ort_config(ort.clone());
            palm = palm.with_ort_config(ort.clone());
            landmark = landmark.with_ort_config(ort.clone());
            gesture = gesture.with_ort_config(ort.clone());
        }

        info!("Loading YOLO model from {}", config.yolo_onnx_path().display());
        let people = yolo.build(config.yolo_onnx_path())?;
        info!(
            "Loading hand models: {}, {}",
            config.hand_detection_model_path().display(),
            config.hand_landmark_model_path().display()
        );
        let palms = palm.build(config.hand_detection_model_path())?;
        let landmarker = landmark.build(config.hand_landmark_model_path())?;
        info!(
            "Loading gesture models: {}, {}",
            config.embedder_model_path().display(),
            config.classifier_model_path().display()
        );
        let gestures =
            gesture.build(config.embedder_model_path(), config.classifier_model_path())?;

        Ok(Self::from_parts(
            people,
            palms,
            landmarker,
            gestures,
            config.maximum_hands(),
        ))
    }

    /// Assembles a pipeline from already built models.
    pub fn from_parts(
        people: YoloModel,
        palms: PalmDetector,
        landmarker: HandLandmarker,
        gestures: GestureRecognizer,
        max_hands: usize,
    ) -> Self {
        Self {
            people,
            palms,
            landmarker,
            gestures,
            max_hands,
            tracked: Vec::new(),
            next_index: 0,
        }
    }

    /// Number of hands carried over from the previous frame.
    pub fn tracked_hands(&self) -> usize {
        self.tracked.len()
    }

    /// Forgets tracked hands, e.g. after a scene cut.
    pub fn reset_tracking(&mut self) {
        self.tracked.clear();
    }

    fn hand_rois(&self, image: &RgbImage) -> DetectResult<Vec<RotatedRect>> {
        let mut rois = self.tracked.clone();
        if rois.len() >= self.max_hands {
            return Ok(rois);
        }

        let (w, h) = image.dimensions();
        for palm in self.palms.detect(image)? {
            if rois.len() >= self.max_hands {
                break;
            }
            let roi = palm_to_roi(&palm, w, h);
            let center = Point::new(roi.cx, roi.cy);
            // Skip palms belonging to a hand that is already tracked.
            if rois.iter().any(|r| r.contains(center)) {
                continue;
            }
            rois.push(roi);
        }
        Ok(rois)
    }

    /// Detects people and hands in one image.
    pub fn process_frame(&mut self, image: &RgbImage) -> DetectResult<FrameResult> {
        let start = Instant::now();
        let frame_index = self.next_index;
        self.next_index += 1;

        let people = self.people.forward(image)?;

        let (w, h) = image.dimensions();
        let carried = self.tracked.len();
        let rois = self.hand_rois(image)?;
        let mut hands = Vec::with_capacity(rois.len());
        let mut next_tracked = Vec::with_capacity(rois.len());
        for (i, roi) in rois.into_iter().enumerate() {
            let detected = match self.landmarker.detect(image, &roi) {
                Ok(detected) => detected,
                // A tracked region that cannot be processed is a lost hand.
                Err(e) if i < carried => {
                    warn!("dropping tracked hand: {}", e);
                    None
                }
                Err(e) => return Err(e),
            };
            let Some(landmarks) = detected else {
                continue;
            };
            let prediction = self.gestures.recognize(&landmarks, w, h)?;
            let next_roi = landmarks_to_roi(&landmarks, w, h);
            if next_roi.is_valid() {
                next_tracked.push(next_roi);
            } else {
                debug!("not tracking degenerate hand region {:?}", next_roi);
            }
            hands.push(HandResult {
                landmarks,
                gesture: prediction.gesture,
                gesture_score: prediction.score,
                roi,
            });
        }
        if next_tracked.len() < self.tracked.len() {
            debug!(
                "lost {} tracked hand(s)",
                self.tracked.len() - next_tracked.len()
            );
        }
        self.tracked = next_tracked;

        Ok(FrameResult {
            frame_index,
            people,
            hands,
            inference_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// Processes frames until the source ends or `max_frames` is reached.
    ///
    /// `on_frame` sees every frame with its result; returning an error stops
    /// the run. The source is opened here and closed before returning.
    pub fn run<F>(
        &mut self,
        source: &mut dyn FrameSource,
        max_frames: Option<u64>,
        mut on_frame: F,
    ) -> DetectResult<PipelineStats>
    where
        F: FnMut(&Frame, &FrameResult) -> DetectResult<()>,
    {
        source.open()?;
        let outcome = self.run_open(source, max_frames, &mut on_frame);
        source.close();

        let stats = outcome?;
        info!(
            "Processed {} frames ({} people, {} hands), {:.2} ms/frame",
            stats.frames, stats.people, stats.hands, stats.avg_ms
        );
        Ok(stats)
    }

    fn run_open<F>(
        &mut self,
        source: &mut dyn FrameSource,
        max_frames: Option<u64>,
        on_frame: &mut F,
    ) -> DetectResult<PipelineStats>
    where
        F: FnMut(&Frame, &FrameResult) -> DetectResult<()>,
    {
        let mut stats = PipelineStats::new();
        while max_frames.is_none_or(|max| stats.frames < max) {
            let Some(frame) = source.read()? else {
                break;
            };
            let mut result = self.process_frame(&frame.image)?;
            result.frame_index = frame.index;
            debug!("{}", result);
            stats.record(&result);
            on_frame(&frame, &result)?;
        }
        if stats.frames == 0 {
            warn!("No frames were read from the source.");
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DetectError, NamedOutput};
    use crate::models::detection::yolo::tests::attrs_first;
    use crate::models::hands::gesture::tests::{classifier_engine, embedder_engine};
    use crate::models::hands::landmark::tests::canned_outputs;
    use crate::models::hands::palm::tests::outputs_with_palm;
    use crate::models::test_support::CannedEngine;
    use crate::models::Gesture;
    use std::sync::Arc;

    struct Engines {
        palm: Arc<CannedEngine>,
        landmark: Arc<CannedEngine>,
    }

    fn pipeline(max_hands: usize, presence_logit: f32) -> (HumanHandPipeline, Engines) {
        pipeline_with_landmarks(max_hands, canned_outputs(presence_logit))
    }

    fn pipeline_with_landmarks(
        max_hands: usize,
        landmark_outputs: Vec<NamedOutput>,
    ) -> (HumanHandPipeline, Engines) {
        let yolo = CannedEngine::new(
            "yolo",
            vec!["images"],
            vec![attrs_first(80, &[(320.0, 320.0, 100.0, 200.0, 0, 0.9)])],
        );
        let palm = Arc::new(CannedEngine::new(
            "palm",
            vec!["input_1"],
            outputs_with_palm(100, 0.0, 40.0),
        ));
        let landmark = Arc::new(CannedEngine::new("landmark", vec!["input_1"], landmark_outputs));

        let people = YoloModelBuilder::new()
            .build_with_engine(Box::new(yolo))
            .unwrap();
        let palms = PalmDetectorBuilder::new()
            .max_hands(max_hands)
            .build_with_engine(Box::new(palm.clone()))
            .unwrap();
        let landmarker = HandLandmarkerBuilder::new()
            .build_with_engine(Box::new(landmark.clone()))
            .unwrap();
        let gestures = GestureRecognizerBuilder::new()
            .build_with_engines(
                Box::new(embedder_engine()),
                Box::new(classifier_engine(vec![
                    0.0, 0.0, 0.0, 0.0, 0.0, 0.9, 0.1, 0.0,
                ])),
            )
            .unwrap();

        (
            HumanHandPipeline::from_parts(people, palms, landmarker, gestures, max_hands),
            Engines { palm, landmark },
        )
    }

    struct VecSource {
        frames: Vec<RgbImage>,
        next: usize,
        opened: bool,
    }

    impl FrameSource for VecSource {
        fn open(&mut self) -> DetectResult<()> {
            self.opened = true;
            Ok(())
        }

        fn read(&mut self) -> DetectResult<Option<Frame>> {
            let Some(image) = self.frames.get(self.next).cloned() else {
                return Ok(None);
            };
            self.next += 1;
            Ok(Some(Frame {
                index: self.next as u64 - 1,
                timestamp_ms: 0.0,
                image,
            }))
        }

        fn close(&mut self) {
            self.opened = false;
        }

        fn dimensions(&self) -> Option<(u32, u32)> {
            self.frames.first().map(|f| f.dimensions())
        }
    }

    #[test]
    fn test_process_frame_finds_person_and_hand() {
        let (mut pipeline, _) = pipeline(2, 3.0);
        let result = pipeline.process_frame(&RgbImage::new(640, 480)).unwrap();

        assert_eq!(result.frame_index, 0);
        assert_eq!(result.people.len(), 1);
        assert_eq!(result.people[0].label, "person");
        assert_eq!(result.hands.len(), 1);
        assert_eq!(result.hands[0].gesture, Gesture::ThumbUp);
        assert_eq!(pipeline.tracked_hands(), 1);
    }

    #[test]
    fn test_tracking_skips_palm_detection_when_full() {
        let (mut pipeline, engines) = pipeline(1, 3.0);
        let image = RgbImage::new(640, 480);

        pipeline.process_frame(&image).unwrap();
        let second = pipeline.process_frame(&image).unwrap();

        assert_eq!(second.frame_index, 1);
        assert_eq!(second.hands.len(), 1);
        assert_eq!(engines.palm.call_count(), 1);
        assert_eq!(engines.landmark.call_count(), 2);
    }

    #[test]
    fn test_tracked_hand_is_not_duplicated() {
        let (mut pipeline, engines) = pipeline(2, 3.0);
        let image = RgbImage::new(640, 480);

        pipeline.process_frame(&image).unwrap();
        let second = pipeline.process_frame(&image).unwrap();

        assert_eq!(engines.palm.call_count(), 2);
        assert_eq!(second.hands.len(), 1);
    }

    #[test]
    fn test_absent_hand_drops_tracking() {
        let (mut pipeline, _) = pipeline(2, -5.0);
        let result = pipeline.process_frame(&RgbImage::new(640, 480)).unwrap();
        assert!(result.hands.is_empty());
        assert_eq!(pipeline.tracked_hands(), 0);
    }

    #[test]
    fn test_collapsed_landmarks_are_not_tracked() {
        let mut outputs = canned_outputs(3.0);
        for (i, v) in outputs[0].data.iter_mut().enumerate() {
            *v = if i % 3 == 2 { 0.0 } else { 112.0 };
        }
        let (mut pipeline, engines) = pipeline_with_landmarks(1, outputs);
        let image = RgbImage::new(640, 480);

        let first = pipeline.process_frame(&image).unwrap();
        assert_eq!(first.hands.len(), 1);
        assert_eq!(pipeline.tracked_hands(), 0);

        let second = pipeline.process_frame(&image).unwrap();
        assert_eq!(second.hands.len(), 1);
        assert_eq!(engines.palm.call_count(), 2);
    }

    #[test]
    fn test_degenerate_tracked_region_is_dropped() {
        let (mut pipeline, _) = pipeline(2, 3.0);
        pipeline.tracked = vec![RotatedRect::new(5.0, 5.0, 0.0, 0.0, 0.0)];

        let result = pipeline.process_frame(&RgbImage::new(640, 480)).unwrap();
        assert_eq!(result.hands.len(), 1);
        assert_eq!(pipeline.tracked_hands(), 1);
        assert!(pipeline.tracked.iter().all(RotatedRect::is_valid));
    }

    #[test]
    fn test_run_honours_max_frames_and_closes_source() {
        let (mut pipeline, _) = pipeline(2, 3.0);
        let mut source = VecSource {
            frames: vec![RgbImage::new(64, 48); 5],
            next: 0,
            opened: false,
        };

        let mut seen = Vec::new();
        let stats = pipeline
            .run(&mut source, Some(3), |frame, result| {
                assert_eq!(frame.index, result.frame_index);
                seen.push(result.frame_index);
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.people, 3);
        assert!(!source.opened);
    }

    #[test]
    fn test_run_stops_on_callback_error() {
        let (mut pipeline, _) = pipeline(2, 3.0);
        let mut source = VecSource {
            frames: vec![RgbImage::new(64, 48); 5],
            next: 0,
            opened: false,
        };

        let err = pipeline
            .run(&mut source, None, |_, _| {
                Err(DetectError::invalid_input("stop"))
            })
            .unwrap_err();
        assert!(err.to_string().contains("stop"));
        assert_eq!(source.next, 1);
        assert!(!source.opened);
    }
}
