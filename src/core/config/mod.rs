//! Configuration primitives shared across the crate.
//!
//! * [`errors`] - configuration errors and the [`ConfigValidator`] trait
//! * [`onnx`] - ONNX Runtime session settings

pub mod errors;
pub mod onnx;

pub use errors::{ConfigError, ConfigValidator};
pub use onnx::{OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig};
