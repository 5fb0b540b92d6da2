//! Model wrappers.
//!
//! Each wrapper owns its preprocessing and output decoding and runs the
//! network through an [`InferenceEngine`], so decoding can be tested with
//! canned outputs.

pub mod detection;
pub mod hands;

pub use detection::*;
pub use hands::*;

use crate::core::config::OrtSessionConfig;
use crate::core::errors::DetectResult;
use crate::core::inference::{InferenceEngine, OrtInfer};
use std::path::Path;

/// Loads an ONNX model, honouring session options when given.
pub(crate) fn load_engine(
    model_path: &Path,
    ort_config: Option<&OrtSessionConfig>,
    input_name: Option<&str>,
) -> DetectResult<Box<dyn InferenceEngine>> {
    let inference = match ort_config {
        Some(config) => OrtInfer::from_config(config, model_path, input_name)?,
        None => OrtInfer::new(model_path, input_name)?,
    };
    tracing::debug!(
        "{}: input shape {:?}, outputs {:?}",
        inference.model_name(),
        inference.primary_input_shape(),
        inference.output_names()
    );
    Ok(Box::new(inference))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::{DetectError, NamedOutput};
    use crate::core::inference::InferenceEngine;
    use ndarray::ArrayViewD;
    use std::sync::Mutex;

    /// Returns fixed outputs and records the shapes it was called with.
    pub struct CannedEngine {
        name: String,
        inputs: Vec<String>,
        outputs: Vec<NamedOutput>,
        pub calls: Mutex<Vec<Vec<(String, Vec<usize>)>>>,
    }

    impl CannedEngine {
        pub fn new(name: &str, inputs: Vec<&str>, outputs: Vec<NamedOutput>) -> Self {
            Self {
                name: name.to_string(),
                inputs: inputs.into_iter().map(str::to_string).collect(),
                outputs,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or(0)
        }
    }

    impl InferenceEngine for CannedEngine {
        fn run(
            &self,
            inputs: &[(&str, ArrayViewD<'_, f32>)],
        ) -> Result<Vec<NamedOutput>, DetectError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(
                    inputs
                        .iter()
                        .map(|(n, v)| (n.to_string(), v.shape().to_vec()))
                        .collect(),
                );
            }
            Ok(self.outputs.clone())
        }

        fn input_names(&self) -> Vec<String> {
            self.inputs.clone()
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    impl InferenceEngine for std::sync::Arc<CannedEngine> {
        fn run(
            &self,
            inputs: &[(&str, ArrayViewD<'_, f32>)],
        ) -> Result<Vec<NamedOutput>, DetectError> {
            self.as_ref().run(inputs)
        }

        fn input_names(&self) -> Vec<String> {
            self.as_ref().input_names()
        }

        fn name(&self) -> &str {
            self.as_ref().name()
        }
    }
}
