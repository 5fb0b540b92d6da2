use super::*;
use crate::core::errors::SimpleError;
use ort::session::SessionInputValue;
use ort::value::TensorRef;
use std::borrow::Cow;

impl OrtInfer {
    /// Returns the configured input name, or the first input declared by the model.
    pub(crate) fn resolve_input_name(&self) -> Result<String, DetectError> {
        if let Some(ref name) = self.input_name {
            return Ok(name.clone());
        }
        let session = self.sessions[0].lock().map_err(|_| {
            DetectError::inference_error(
                &self.model_name,
                "failed to acquire session lock",
                SimpleError::new("Session lock acquisition failed"),
            )
        })?;
        session.inputs.first().map(|i| i.name.clone()).ok_or_else(|| {
            DetectError::invalid_input(format!(
                "Model '{}' declares no inputs - model may be invalid or corrupted",
                self.model_name
            ))
        })
    }

    /// Runs the model with any number of named f32 inputs and returns every
    /// declared output as a flattened [`NamedOutput`].
    pub fn run_named(
        &self,
        inputs: &[(&str, ndarray::ArrayViewD<'_, f32>)],
    ) -> Result<Vec<NamedOutput>, DetectError> {
        let first_shape: Vec<usize> = inputs
            .first()
            .map(|(_, v)| v.shape().to_vec())
            .unwrap_or_default();

        let mut session_inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)> =
            Vec::with_capacity(inputs.len());
        for (name, view) in inputs {
            let shape = view.shape().to_vec();
            let tensor = TensorRef::from_array_view(view.view()).map_err(|e| {
                DetectError::model_inference_error(
                    &self.model_name,
                    "tensor_conversion",
                    &shape,
                    &format!("Failed to convert input '{}'", name),
                    e,
                )
            })?;
            session_inputs.push((Cow::Borrowed(*name), SessionInputValue::from(tensor)));
        }

        let idx = self
            .next_idx
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            % self.sessions.len();
        let mut session_guard = self.sessions[idx].lock().map_err(|_| {
            DetectError::inference_error(
                &self.model_name,
                &format!(
                    "Failed to acquire session lock for session {}/{}",
                    idx,
                    self.sessions.len()
                ),
                SimpleError::new("Session lock acquisition failed"),
            )
        })?;

        // Collect declared output names before running (avoid borrow conflicts later)
        let output_names: Vec<String> = session_guard
            .outputs
            .iter()
            .map(|o| o.name.clone())
            .collect();

        let outputs = session_guard.run(session_inputs).map_err(|e| {
            DetectError::model_inference_error(
                &self.model_name,
                "forward_pass",
                &first_shape,
                "ONNX Runtime inference failed",
                e,
            )
        })?;

        let mut results = Vec::with_capacity(output_names.len());
        for name in &output_names {
            let (shape, data) = outputs[name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    DetectError::model_inference_error(
                        &self.model_name,
                        "output_extraction",
                        &first_shape,
                        &format!("Failed to extract output tensor '{}' as f32", name),
                        e,
                    )
                })?;
            let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            results.push(NamedOutput::new(name.clone(), shape, data.to_vec()));
        }

        Ok(results)
    }

    /// Runs a single-input model and returns its first output as a 3D tensor.
    pub fn infer_3d(&self, x: &Tensor4D) -> Result<Tensor3D, DetectError> {
        let outputs = InferenceEngine::infer(self, x)?;
        let first = outputs.first().ok_or_else(|| {
            DetectError::invalid_input(format!(
                "No outputs available from model '{}'",
                self.model_name
            ))
        })?;
        output_to_tensor3d(&self.model_name, first)
    }
}
