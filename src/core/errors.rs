//! Error types for the detection pipeline.
//!
//! This module defines the errors that can occur while loading configuration,
//! decoding video, running ONNX models, and unpacking model bundles. It also
//! provides constructor helpers that attach context in a consistent way.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stage of processing in which a [`DetectError::Processing`] error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred during tensor operations.
    TensorOperation,
    /// Error occurred during image normalization.
    Normalization,
    /// Error occurred during image resizing or warping.
    Resize,
    /// Error occurred while decoding raw model outputs.
    Decode,
    /// Error occurred during post-processing.
    PostProcessing,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::Decode => write!(f, "decode"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// A plain message error used as the `source` of wrapped errors when no
/// underlying library error exists.
#[derive(Debug, Clone)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SimpleError {}

/// Errors produced anywhere in the crate.
#[derive(Error, Debug)]
pub enum DetectError {
    /// Error occurred while loading an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        kind: ProcessingStage,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred during inference.
    #[error("inference failed in model '{model_name}': {context}")]
    Inference {
        model_name: String,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Inference failure with tensor shape information.
    #[error("model '{model_name}' failed during {operation} (input shape {input_shape:?}): {context}")]
    ModelInference {
        model_name: String,
        operation: String,
        input_shape: Vec<usize>,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError { message: String },

    /// A model file could not be loaded.
    #[error("failed to load model '{}': {reason}", path.display())]
    ModelLoad {
        path: PathBuf,
        reason: String,
        suggestion: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A model bundle is malformed or incomplete.
    #[error("bundle: {message}")]
    Bundle { message: String },

    /// A video or image source could not be opened or read.
    #[error("video source: {message}")]
    Source { message: String },

    /// A model export command failed.
    #[error("export: {message}")]
    Export { message: String },

    /// A model download failed.
    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias.
pub type DetectResult<T> = Result<T, DetectError>;

impl DetectError {
    fn processing_with_context(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an error for tensor operations.
    pub fn tensor_operation(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::TensorOperation, context, error)
    }

    /// Creates an error for post-processing operations.
    pub fn post_processing(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::PostProcessing, context, error)
    }

    /// Creates an error for normalization operations.
    pub fn normalization(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Normalization, context, error)
    }

    /// Creates an error for resize and warp operations.
    pub fn resize_error(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Resize, context, error)
    }

    /// Creates an error for raw output decoding.
    pub fn decode_error(context: impl Into<String>) -> Self {
        let context = context.into();
        Self::processing_with_context(
            ProcessingStage::Decode,
            context.clone(),
            SimpleError::new(context),
        )
    }

    /// Creates an inference error attributed to a model.
    pub fn inference_error(
        model_name: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an inference error carrying the input tensor shape.
    pub fn model_inference_error(
        model_name: &str,
        operation: &str,
        input_shape: &[usize],
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ModelInference {
            model_name: model_name.to_string(),
            operation: operation.to_string(),
            input_shape: input_shape.to_vec(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a model loading error with an optional hint for the user.
    pub fn model_load_error(
        path: &Path,
        reason: &str,
        suggestion: Option<&str>,
        error: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        Self::ModelLoad {
            path: path.to_path_buf(),
            reason: reason.to_string(),
            suggestion: suggestion.map(str::to_string),
            source: error.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Creates an error for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an error for configuration problems.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a configuration error naming the offending field and value.
    pub fn config_error_with_context(field: &str, value: &str, reason: &str) -> Self {
        Self::ConfigError {
            message: format!(
                "Configuration error in field '{}' with value '{}': {}",
                field, value, reason
            ),
        }
    }

    /// Creates an error for malformed or incomplete model bundles.
    pub fn bundle_error(message: impl Into<String>) -> Self {
        Self::Bundle {
            message: message.into(),
        }
    }

    /// Creates an error for video and image sources.
    pub fn source_error(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Creates an error for a failed model export.
    pub fn export_error(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    /// Creates an error for a failed download.
    pub fn download_error(url: &str, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// Checks that a tensor has the expected rank, producing a decode error otherwise.
    pub fn ensure_rank(model_name: &str, shape: &[usize], expected: usize) -> DetectResult<()> {
        if shape.len() == expected {
            Ok(())
        } else {
            Err(Self::decode_error(format!(
                "model '{}': expected {}D output tensor, got {}D with shape {:?}",
                model_name,
                expected,
                shape.len(),
                shape
            )))
        }
    }
}

impl From<image::ImageError> for DetectError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl From<crate::core::config::ConfigError> for DetectError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for DetectError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::Bundle {
            message: error.to_string(),
        }
    }
}
