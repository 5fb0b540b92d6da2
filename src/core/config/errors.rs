//! Configuration error types and validation traits.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while parsing or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is absent.
    #[error("Missing required configuration key: '{key}'")]
    MissingKey { key: String },

    /// A model or asset path does not exist.
    #[error("Path for key '{key}' does not exist: {}", path.display())]
    ModelPathNotFound { key: String, path: PathBuf },

    /// A value lies outside its allowed range.
    #[error("Configuration '{key}' must be in {range}, got {value}.")]
    OutOfRange {
        key: String,
        range: String,
        value: String,
    },

    /// A value has the wrong type or shape.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A cross-field validation failed.
    #[error("validation failed: {message}")]
    ValidationFailed { message: String },
}

/// A trait for validating configuration parameters.
///
/// Implementors provide [`validate`](ConfigValidator::validate) and
/// [`get_defaults`](ConfigValidator::get_defaults); the remaining helpers
/// cover the checks shared by every configuration type in the crate.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Checks that `value` lies in the closed interval `[0, 1]`.
    fn validate_unit_interval(&self, key: &str, value: f32) -> Result<(), ConfigError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange {
                key: key.to_string(),
                range: "[0, 1]".to_string(),
                value: value.to_string(),
            })
        }
    }

    /// Checks that an integer setting is strictly positive.
    fn validate_positive(&self, key: &str, value: i64) -> Result<(), ConfigError> {
        if value > 0 {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange {
                key: key.to_string(),
                range: "(0, inf)".to_string(),
                value: value.to_string(),
            })
        }
    }

    /// Checks that a model path exists on disk.
    fn validate_model_path(&self, key: &str, path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            Ok(())
        } else {
            Err(ConfigError::ModelPathNotFound {
                key: key.to_string(),
                path: path.to_path_buf(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thresholds {
        score: f32,
    }

    impl ConfigValidator for Thresholds {
        fn validate(&self) -> Result<(), ConfigError> {
            self.validate_unit_interval("score", self.score)
        }

        fn get_defaults() -> Self {
            Self { score: 0.5 }
        }
    }

    #[test]
    fn test_unit_interval_bounds() {
        assert!(Thresholds { score: 0.0 }.validate().is_ok());
        assert!(Thresholds { score: 1.0 }.validate().is_ok());
        assert!(Thresholds::get_defaults().validate().is_ok());

        let err = Thresholds { score: 1.5 }.validate().unwrap_err();
        assert_eq!(err.to_string(), "Configuration 'score' must be in [0, 1], got 1.5.");
        assert!(Thresholds { score: f32::NAN }.validate().is_err());
    }

    #[test]
    fn test_validate_positive() {
        let t = Thresholds::get_defaults();
        assert!(t.validate_positive("video_fps", 30).is_ok());
        assert!(t.validate_positive("video_fps", 0).is_err());
    }

    #[test]
    fn test_missing_key_message() {
        let err = ConfigError::MissingKey {
            key: "video_fps".to_string(),
        };
        assert_eq!(err.to_string(), "Missing required configuration key: 'video_fps'");
    }
}
