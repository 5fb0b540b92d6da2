//! ONNX Runtime inference engine with a small session pool.

use crate::core::{
    errors::DetectError,
    tensor::{NamedOutput, Tensor3D, Tensor4D},
};
use ndarray::ArrayViewD;
use ort::{session::Session, value::ValueType};
use std::sync::Mutex;

#[path = "ort_infer_builders.rs"]
mod ort_infer_builders;
#[path = "ort_infer_execution.rs"]
mod ort_infer_execution;
#[cfg(test)]
#[path = "ort_infer_tests.rs"]
mod ort_infer_tests;

/// A loaded ONNX model.
///
/// Sessions sit behind mutexes and are picked round-robin, so a single
/// `OrtInfer` can be shared by reference between threads.
pub struct OrtInfer {
    pub(super) sessions: Vec<Mutex<Session>>,
    pub(super) next_idx: std::sync::atomic::AtomicUsize,
    pub(super) input_name: Option<String>,
    pub(super) model_path: std::path::PathBuf,
    pub(super) model_name: String,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("model_path", &self.model_path)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl OrtInfer {
    /// Attempts to retrieve the primary input tensor shape from the first session.
    ///
    /// Dynamic dimensions (e.g., -1) are returned as-is.
    pub fn primary_input_shape(&self) -> Option<Vec<i64>> {
        let session_guard = self.sessions.first()?.lock().ok()?;
        let input = session_guard.inputs.first()?;
        match &input.input_type {
            ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
            _ => None,
        }
    }

    /// Names of the model inputs in declaration order.
    pub fn input_names(&self) -> Vec<String> {
        self.sessions
            .first()
            .and_then(|s| s.lock().ok())
            .map(|s| s.inputs.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Names of the model outputs in declaration order.
    pub fn output_names(&self) -> Vec<String> {
        self.sessions
            .first()
            .and_then(|s| s.lock().ok())
            .map(|s| s.outputs.iter().map(|o| o.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the model path associated with this inference engine.
    pub fn model_path(&self) -> &std::path::Path {
        &self.model_path
    }

    /// Returns the model name associated with this inference engine.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Number of pooled sessions.
    pub fn pool_size(&self) -> usize {
        self.sessions.len()
    }
}

/// Runs ONNX-style models and returns every output.
///
/// Implemented by [`OrtInfer`]; model wrappers depend on this trait so their
/// decoding logic can be exercised with canned outputs.
pub trait InferenceEngine: Send + Sync {
    /// Runs the model with named f32 inputs.
    fn run(&self, inputs: &[(&str, ArrayViewD<'_, f32>)]) -> Result<Vec<NamedOutput>, DetectError>;

    /// Declared input names in order.
    fn input_names(&self) -> Vec<String>;

    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Runs a single-input model on one image tensor.
    fn infer(&self, input: &Tensor4D) -> Result<Vec<NamedOutput>, DetectError> {
        let name = self
            .input_names()
            .into_iter()
            .next()
            .unwrap_or_else(|| "images".to_string());
        self.run(&[(name.as_str(), input.view().into_dyn())])
    }
}

impl InferenceEngine for OrtInfer {
    fn run(&self, inputs: &[(&str, ArrayViewD<'_, f32>)]) -> Result<Vec<NamedOutput>, DetectError> {
        self.run_named(inputs)
    }

    fn input_names(&self) -> Vec<String> {
        OrtInfer::input_names(self)
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn infer(&self, input: &Tensor4D) -> Result<Vec<NamedOutput>, DetectError> {
        let input_name = self.resolve_input_name()?;
        self.run_named(&[(input_name.as_str(), input.view().into_dyn())])
    }
}

/// Converts a 3D output into an owned [`Tensor3D`].
pub fn output_to_tensor3d(model_name: &str, output: &NamedOutput) -> Result<Tensor3D, DetectError> {
    DetectError::ensure_rank(model_name, &output.shape, 3)?;
    let (a, b, c) = (output.shape[0], output.shape[1], output.shape[2]);
    if output.data.len() != a * b * c {
        return Err(DetectError::invalid_input(format!(
            "Output data size mismatch: expected {}, got {}",
            a * b * c,
            output.data.len()
        )));
    }
    Ok(Tensor3D::from_shape_vec((a, b, c), output.data.clone())?)
}
