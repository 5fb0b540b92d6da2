//! Structures and helpers for ONNX Runtime inference.
//!
//! This module centralizes the low level inference engine and the
//! [`InferenceEngine`] trait that model wrappers are written against.

pub mod ort_infer;
pub mod session;

pub use ort_infer::{InferenceEngine, OrtInfer, output_to_tensor3d};
pub use session::load_session;
