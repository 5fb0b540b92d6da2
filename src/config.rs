//! Application configuration loaded from a JSON file.
//!
//! Model paths may be relative; they resolve against the directory holding
//! the configuration file and must exist. Thresholds default when absent and
//! must lie in `[0, 1]`.

use crate::core::config::{ConfigError, ConfigValidator, OrtSessionConfig};
use crate::core::errors::{DetectError, DetectResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default confidence threshold for person detections.
pub const DEFAULT_YOLO_THRESHOLD: f32 = 0.5;
/// Default palm detection score threshold.
pub const DEFAULT_HAND_DETECTION_THRESHOLD: f32 = 0.5;
/// Default IoU threshold for merging palm detections.
pub const DEFAULT_HANDS_NMS_THRESHOLD: f32 = 0.3;
/// Default minimum gesture confidence.
pub const DEFAULT_GESTURE_THRESHOLD: f32 = 0.5;
/// Default minimum hand presence score.
pub const DEFAULT_HAND_PRESENCE_THRESHOLD: f32 = 0.5;

/// Validated application configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    yolo_onnx_path: PathBuf,
    yolo_threshold: f32,
    yolo_input_size: (u32, u32),
    video_source: String,
    video_fps: u32,
    classifier_model_path: PathBuf,
    embedder_model_path: PathBuf,
    hand_landmark_model_path: PathBuf,
    hand_detection_model_path: PathBuf,
    hand_detection_threshold: f32,
    maximum_hands: usize,
    hands_nms_threshold: f32,
    gesture_threshold: f32,
    hand_presence_threshold: f32,
    ort: Option<OrtSessionConfig>,
}

struct RawConfig<'a> {
    raw: &'a Map<String, Value>,
    base_dir: &'a Path,
}

impl RawConfig<'_> {
    fn require(&self, key: &str) -> Result<&Value, ConfigError> {
        self.raw.get(key).ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })
    }

    fn path(&self, key: &str) -> Result<PathBuf, ConfigError> {
        let value = self.require(key)?;
        let Some(s) = value.as_str() else {
            return Err(ConfigError::InvalidConfig {
                message: format!("Configuration key '{key}' must be a string path."),
            });
        };

        let mut path = PathBuf::from(s);
        if !path.is_absolute() {
            path = self.base_dir.join(path);
        }
        if !path.exists() {
            return Err(ConfigError::ModelPathNotFound {
                key: key.to_string(),
                path,
            });
        }
        Ok(path.canonicalize().unwrap_or(path))
    }

    fn threshold(&self, key: &str, default: f32) -> Result<f32, ConfigError> {
        let value = match self.raw.get(key) {
            None | Some(Value::Null) => default,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN) as f32,
            Some(Value::String(s)) => {
                s.trim()
                    .parse::<f32>()
                    .map_err(|_| ConfigError::InvalidConfig {
                        message: format!("Configuration '{key}' must be a number."),
                    })?
            }
            Some(_) => {
                return Err(ConfigError::InvalidConfig {
                    message: format!("Configuration '{key}' must be a number."),
                });
            }
        };

        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(ConfigError::OutOfRange {
                key: key.to_string(),
                range: "[0, 1]".to_string(),
                value: value.to_string(),
            })
        }
    }

    fn integer(&self, key: &str) -> Result<i64, ConfigError> {
        as_integer(self.require(key)?).ok_or_else(|| ConfigError::InvalidConfig {
            message: format!("Configuration '{key}' must be an integer."),
        })
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn positive(key: &str, value: i64) -> Result<i64, ConfigError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            key: key.to_string(),
            range: "(0, inf)".to_string(),
            value: value.to_string(),
        })
    }
}

/// A positive integer that must also fit `T`.
fn positive_as<T: TryFrom<i64>>(key: &str, value: i64) -> Result<T, ConfigError> {
    T::try_from(positive(key, value)?).map_err(|_| ConfigError::OutOfRange {
        key: key.to_string(),
        range: format!("(0, {}::MAX]", std::any::type_name::<T>()),
        value: value.to_string(),
    })
}

impl AppConfig {
    /// Loads and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> DetectResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DetectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Config file does not exist: {}", path.display()),
            )));
        }

        info!("Loading configuration from '{}'", path.display());
        let content = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json_str(&content, base_dir)
    }

    /// Parses a configuration document, resolving relative paths against `base_dir`.
    pub fn from_json_str(json: &str, base_dir: &Path) -> DetectResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| DetectError::config_error(format!("Failed to parse JSON config: {e}")))?;
        let Value::Object(raw) = value else {
            return Err(ConfigError::InvalidConfig {
                message: "configuration root must be a JSON object".to_string(),
            }
            .into());
        };

        let base_dir = if base_dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            base_dir
        };
        let raw = RawConfig {
            raw: &raw,
            base_dir,
        };

        let yolo_onnx_path = raw.path("yolo_onnx_path")?;
        let classifier_model_path = raw.path("classifier_model_path")?;
        let embedder_model_path = raw.path("embedder_model_path")?;
        let hand_landmark_model_path = raw.path("hand_landmark_model_path")?;
        let hand_detection_model_path = raw.path("hand_detection_model_path")?;

        let yolo_threshold = raw.threshold("yolo_threshold", DEFAULT_YOLO_THRESHOLD)?;
        let hand_detection_threshold =
            raw.threshold("hand_detection_threshold", DEFAULT_HAND_DETECTION_THRESHOLD)?;
        let hands_nms_threshold =
            raw.threshold("hands_nms_threshold", DEFAULT_HANDS_NMS_THRESHOLD)?;
        let gesture_threshold = raw.threshold("gesture_threshold", DEFAULT_GESTURE_THRESHOLD)?;
        let hand_presence_threshold =
            raw.threshold("hand_presence_threshold", DEFAULT_HAND_PRESENCE_THRESHOLD)?;

        let input_size_error = || ConfigError::InvalidConfig {
            message: "Configuration 'yolo_input_size' must be a list of two integers [width, height]."
                .to_string(),
        };
        let yolo_input_size = match raw.require("yolo_input_size")? {
            Value::Array(items) if items.len() == 2 => {
                let width = as_integer(&items[0]).ok_or_else(input_size_error)?;
                let height = as_integer(&items[1]).ok_or_else(input_size_error)?;
                (
                    positive_as::<u32>("yolo_input_size", width)?,
                    positive_as::<u32>("yolo_input_size", height)?,
                )
            }
            _ => return Err(input_size_error().into()),
        };

        let video_source = match raw.require("video_source")? {
            Value::String(s) => s.clone(),
            _ => {
                return Err(ConfigError::InvalidConfig {
                    message: "Configuration 'video_source' must be a string.".to_string(),
                }
                .into());
            }
        };

        let video_fps = positive_as::<u32>("video_fps", raw.integer("video_fps")?)?;
        let maximum_hands = positive_as::<usize>("maximum_hands", raw.integer("maximum_hands")?)?;

        let ort = match raw.raw.get("ort") {
            None | Some(Value::Null) => None,
            Some(v) => Some(serde_json::from_value::<OrtSessionConfig>(v.clone()).map_err(
                |e| ConfigError::InvalidConfig {
                    message: format!("Configuration 'ort' is invalid: {e}"),
                },
            )?),
        };

        let config = Self {
            yolo_onnx_path,
            yolo_threshold,
            yolo_input_size,
            video_source,
            video_fps,
            classifier_model_path,
            embedder_model_path,
            hand_landmark_model_path,
            hand_detection_model_path,
            hand_detection_threshold,
            maximum_hands,
            hands_nms_threshold,
            gesture_threshold,
            hand_presence_threshold,
            ort,
        };

        info!("Configuration successfully loaded and validated.");
        config.log_fields();
        Ok(config)
    }

    fn log_fields(&self) {
        debug!(yolo_onnx_path = %self.yolo_onnx_path.display(), "parsed config");
        debug!(yolo_threshold = self.yolo_threshold, "parsed config");
        debug!(yolo_input_size = ?self.yolo_input_size, "parsed config");
        debug!(video_source = %self.video_source, "parsed config");
        debug!(video_fps = self.video_fps, "parsed config");
        debug!(classifier_model_path = %self.classifier_model_path.display(), "parsed config");
        debug!(embedder_model_path = %self.embedder_model_path.display(), "parsed config");
        debug!(
            hand_landmark_model_path = %self.hand_landmark_model_path.display(),
            "parsed config"
        );
        debug!(
            hand_detection_model_path = %self.hand_detection_model_path.display(),
            "parsed config"
        );
        debug!(hand_detection_threshold = self.hand_detection_threshold, "parsed config");
        debug!(maximum_hands = self.maximum_hands, "parsed config");
        debug!(hands_nms_threshold = self.hands_nms_threshold, "parsed config");
        debug!(gesture_threshold = self.gesture_threshold, "parsed config");
        debug!(hand_presence_threshold = self.hand_presence_threshold, "parsed config");
        debug!(ort = ?self.ort, "parsed config");
    }

    /// Path to the YOLO ONNX model.
    pub fn yolo_onnx_path(&self) -> &Path {
        &self.yolo_onnx_path
    }

    /// Confidence threshold for person detections.
    pub fn yolo_threshold(&self) -> f32 {
        self.yolo_threshold
    }

    /// YOLO input size as `(width, height)`.
    pub fn yolo_input_size(&self) -> (u32, u32) {
        self.yolo_input_size
    }

    /// Video source string: a camera index, file, URL or image directory.
    pub fn video_source(&self) -> &str {
        &self.video_source
    }

    /// Target frames per second for capture.
    pub fn video_fps(&self) -> u32 {
        self.video_fps
    }

    /// Canned gesture classifier model.
    pub fn classifier_model_path(&self) -> &Path {
        &self.classifier_model_path
    }

    /// Gesture embedder model.
    pub fn embedder_model_path(&self) -> &Path {
        &self.embedder_model_path
    }

    /// Hand landmark model.
    pub fn hand_landmark_model_path(&self) -> &Path {
        &self.hand_landmark_model_path
    }

    /// Palm detector model.
    pub fn hand_detection_model_path(&self) -> &Path {
        &self.hand_detection_model_path
    }

    /// Minimum palm detection score.
    pub fn hand_detection_threshold(&self) -> f32 {
        self.hand_detection_threshold
    }

    /// Maximum number of hands tracked per frame.
    pub fn maximum_hands(&self) -> usize {
        self.maximum_hands
    }

    /// IoU threshold for suppressing overlapping palms.
    pub fn hands_nms_threshold(&self) -> f32 {
        self.hands_nms_threshold
    }

    /// Minimum classifier score for a gesture other than `None`.
    pub fn gesture_threshold(&self) -> f32 {
        self.gesture_threshold
    }

    /// Minimum hand presence score for landmarks to be kept.
    pub fn hand_presence_threshold(&self) -> f32 {
        self.hand_presence_threshold
    }

    /// ONNX Runtime session options, if configured.
    pub fn ort(&self) -> Option<&OrtSessionConfig> {
        self.ort.as_ref()
    }

    /// Replaces the video source, e.g. from a command-line override.
    pub fn with_video_source(mut self, source: impl Into<String>) -> Self {
        self.video_source = source.into();
        self
    }

    /// Replaces the ONNX Runtime session options.
    pub fn with_ort(mut self, ort: OrtSessionConfig) -> Self {
        self.ort = Some(ort);
        self
    }

    /// All model paths with their configuration keys.
    pub fn model_paths(&self) -> [(&'static str, &Path); 5] {
        [
            ("yolo_onnx_path", &self.yolo_onnx_path),
            ("classifier_model_path", &self.classifier_model_path),
            ("embedder_model_path", &self.embedder_model_path),
            ("hand_landmark_model_path", &self.hand_landmark_model_path),
            ("hand_detection_model_path", &self.hand_detection_model_path),
        ]
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_unit_interval("yolo_threshold", self.yolo_threshold)?;
        self.validate_unit_interval("hand_detection_threshold", self.hand_detection_threshold)?;
        self.validate_unit_interval("hands_nms_threshold", self.hands_nms_threshold)?;
        self.validate_unit_interval("gesture_threshold", self.gesture_threshold)?;
        self.validate_unit_interval("hand_presence_threshold", self.hand_presence_threshold)?;
        self.validate_positive("yolo_input_size", self.yolo_input_size.0 as i64)?;
        self.validate_positive("yolo_input_size", self.yolo_input_size.1 as i64)?;
        self.validate_positive("video_fps", self.video_fps as i64)?;
        self.validate_positive("maximum_hands", self.maximum_hands as i64)?;
        for (key, path) in self.model_paths() {
            self.validate_model_path(key, path)?;
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self {
            yolo_onnx_path: PathBuf::from("yolo11n.onnx"),
            yolo_threshold: DEFAULT_YOLO_THRESHOLD,
            yolo_input_size: (640, 640),
            video_source: "0".to_string(),
            video_fps: 30,
            classifier_model_path: PathBuf::from(
                "hand_gesture_recognizer/canned_gesture_classifier.onnx",
            ),
            embedder_model_path: PathBuf::from("hand_gesture_recognizer/gesture_embedder.onnx"),
            hand_landmark_model_path: PathBuf::from(
                "hand_landmarker/hand_landmarks_detector.onnx",
            ),
            hand_detection_model_path: PathBuf::from("hand_landmarker/hand_detector.onnx"),
            hand_detection_threshold: DEFAULT_HAND_DETECTION_THRESHOLD,
            maximum_hands: 2,
            hands_nms_threshold: DEFAULT_HANDS_NMS_THRESHOLD,
            gesture_threshold: DEFAULT_GESTURE_THRESHOLD,
            hand_presence_threshold: DEFAULT_HAND_PRESENCE_THRESHOLD,
            ort: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn model_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["yolo.onnx", "cls.onnx", "emb.onnx", "lm.onnx", "det.onnx"] {
            fs::write(dir.path().join(name), b"stub").unwrap();
        }
        dir
    }

    fn base_json() -> Value {
        json!({
            "yolo_onnx_path": "yolo.onnx",
            "yolo_input_size": [640, 480],
            "video_source": "0",
            "video_fps": 30,
            "classifier_model_path": "cls.onnx",
            "embedder_model_path": "emb.onnx",
            "hand_landmark_model_path": "lm.onnx",
            "hand_detection_model_path": "det.onnx",
            "maximum_hands": 2
        })
    }

    fn parse(value: &Value, dir: &Path) -> DetectResult<AppConfig> {
        AppConfig::from_json_str(&value.to_string(), dir)
    }

    #[test]
    fn test_defaults_applied() {
        let dir = model_dir();
        let cfg = parse(&base_json(), dir.path()).unwrap();

        assert_eq!(cfg.yolo_threshold(), 0.5);
        assert_eq!(cfg.hand_detection_threshold(), 0.5);
        assert_eq!(cfg.hands_nms_threshold(), 0.3);
        assert_eq!(cfg.gesture_threshold(), 0.5);
        assert_eq!(cfg.yolo_input_size(), (640, 480));
        assert_eq!(cfg.video_source(), "0");
        assert_eq!(cfg.video_fps(), 30);
        assert_eq!(cfg.maximum_hands(), 2);
        assert!(cfg.ort().is_none());
        assert!(cfg.yolo_onnx_path().is_absolute());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_key() {
        let dir = model_dir();
        let mut value = base_json();
        value.as_object_mut().unwrap().remove("video_fps");
        let err = parse(&value, dir.path()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration: Missing required configuration key: 'video_fps'"
        );
    }

    #[test]
    fn test_missing_model_path_names_key() {
        let dir = model_dir();
        let mut value = base_json();
        value["embedder_model_path"] = json!("nope.onnx");
        let err = parse(&value, dir.path()).unwrap_err();
        assert!(err.to_string().contains("embedder_model_path"));
    }

    #[test]
    fn test_path_must_be_string() {
        let dir = model_dir();
        let mut value = base_json();
        value["yolo_onnx_path"] = json!(42);
        let err = parse(&value, dir.path()).unwrap_err();
        assert!(err.to_string().contains("must be a string path"));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let dir = model_dir();
        let mut value = base_json();
        value["hands_nms_threshold"] = json!(1.5);
        let err = parse(&value, dir.path()).unwrap_err();
        assert!(
            err.to_string()
                .contains("Configuration 'hands_nms_threshold' must be in [0, 1], got 1.5.")
        );
    }

    #[test]
    fn test_bad_input_size() {
        let dir = model_dir();
        for bad in [json!([640]), json!("640x640"), json!([640, "wide"]), json!([0, 640])] {
            let mut value = base_json();
            value["yolo_input_size"] = bad;
            assert!(parse(&value, dir.path()).is_err());
        }
    }

    #[test]
    fn test_integers_required() {
        let dir = model_dir();
        let mut value = base_json();
        value["maximum_hands"] = json!(1.5);
        assert!(parse(&value, dir.path()).is_err());

        value["maximum_hands"] = json!(0);
        assert!(parse(&value, dir.path()).is_err());

        value["maximum_hands"] = json!(4.0);
        assert_eq!(parse(&value, dir.path()).unwrap().maximum_hands(), 4);
    }

    #[test]
    fn test_values_beyond_u32_rejected() {
        let dir = model_dir();
        let mut value = base_json();
        value["video_fps"] = json!(4294967296_i64);
        let err = parse(&value, dir.path()).unwrap_err();
        assert!(err.to_string().contains("video_fps"));
        assert!(err.to_string().contains("4294967296"));

        let mut value = base_json();
        value["yolo_input_size"] = json!([4294967296_i64, 640]);
        assert!(parse(&value, dir.path()).is_err());

        let mut value = base_json();
        value["video_fps"] = json!(4294967295_i64);
        assert_eq!(parse(&value, dir.path()).unwrap().video_fps(), u32::MAX);
    }

    #[test]
    fn test_video_source_must_be_string() {
        let dir = model_dir();
        let mut value = base_json();
        value["video_source"] = json!(0);
        assert!(parse(&value, dir.path()).is_err());
    }

    #[test]
    fn test_invalid_json() {
        let err = AppConfig::from_json_str("{not json", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse JSON config"));
    }

    #[test]
    fn test_ort_section() {
        let dir = model_dir();
        let mut value = base_json();
        value["ort"] = json!({"intra_threads": 2, "session_pool_size": 3});
        let cfg = parse(&value, dir.path()).unwrap();
        let ort = cfg.ort().unwrap();
        assert_eq!(ort.intra_threads, Some(2));
        assert_eq!(ort.pool_size(), 3);
    }

    #[test]
    fn test_from_file_resolves_relative_to_config() {
        let dir = model_dir();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, base_json().to_string()).unwrap();

        let cfg = AppConfig::from_file(&config_path).unwrap();
        assert_eq!(
            cfg.hand_detection_model_path(),
            dir.path().join("det.onnx").canonicalize().unwrap()
        );

        let missing = AppConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, DetectError::Io(_)));
    }
}
