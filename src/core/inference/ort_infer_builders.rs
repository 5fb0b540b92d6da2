use super::*;
use crate::core::config::{OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig};
use ort::execution_providers::ExecutionProviderDispatch;
use ort::logging::LogLevel;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use std::path::Path;

impl OrtInfer {
    /// Creates a new OrtInfer instance with default ONNX Runtime settings and a single session.
    ///
    /// `input_name` overrides the name of the image input; when `None` the
    /// first declared model input is used.
    pub fn new(model_path: impl AsRef<Path>, input_name: Option<&str>) -> Result<Self, DetectError> {
        let path = model_path.as_ref();
        Self::ensure_model_file(path)?;
        let session = Session::builder()?
            .with_log_level(LogLevel::Error)?
            .commit_from_file(path)
            .map_err(|e| {
                DetectError::model_load_error(
                    path,
                    "failed to create ONNX session",
                    Some("verify model path and that the file is an ONNX model"),
                    Some(e),
                )
            })?;

        Ok(OrtInfer {
            sessions: vec![Mutex::new(session)],
            next_idx: std::sync::atomic::AtomicUsize::new(0),
            input_name: input_name.map(str::to_string),
            model_path: path.to_path_buf(),
            model_name: Self::model_name_from_path(path),
        })
    }

    /// Creates a new OrtInfer instance from an [`OrtSessionConfig`], building
    /// one session per pool slot.
    pub fn from_config(
        config: &OrtSessionConfig,
        model_path: impl AsRef<Path>,
        input_name: Option<&str>,
    ) -> Result<Self, DetectError> {
        let path = model_path.as_ref();
        Self::ensure_model_file(path)?;
        let pool_size = config.pool_size();
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let builder = Session::builder()?.with_log_level(LogLevel::Error)?;
            let builder = Self::apply_ort_config(builder, config)?;
            let session = builder.commit_from_file(path).map_err(|e| {
                DetectError::model_load_error(
                    path,
                    "failed to create ONNX session",
                    Some("check execution provider configuration and model file"),
                    Some(e),
                )
            })?;
            sessions.push(Mutex::new(session));
        }

        tracing::debug!(
            "Loaded '{}' with {} session(s)",
            path.display(),
            sessions.len()
        );

        Ok(OrtInfer {
            sessions,
            next_idx: std::sync::atomic::AtomicUsize::new(0),
            input_name: input_name.map(str::to_string),
            model_path: path.to_path_buf(),
            model_name: Self::model_name_from_path(path),
        })
    }

    fn ensure_model_file(path: &Path) -> Result<(), DetectError> {
        if path.is_file() {
            Ok(())
        } else {
            Err(DetectError::model_load_error(
                path,
                "model file does not exist",
                Some("download or export the model first (see the `export` and `unpack` commands)"),
                None::<ort::Error>,
            ))
        }
    }

    fn model_name_from_path(path: &Path) -> String {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string()
    }

    fn apply_ort_config(
        mut builder: SessionBuilder,
        cfg: &OrtSessionConfig,
    ) -> Result<SessionBuilder, ort::Error> {
        if let Some(intra) = cfg.intra_threads {
            builder = builder.with_intra_threads(intra)?;
        }
        if let Some(inter) = cfg.inter_threads {
            builder = builder.with_inter_threads(inter)?;
        }
        if let Some(level) = cfg.optimization_level {
            let mapped = match level {
                OrtGraphOptimizationLevel::DisableAll => GraphOptimizationLevel::Disable,
                OrtGraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
                OrtGraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
                OrtGraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
            };
            builder = builder.with_optimization_level(mapped)?;
        }
        if let Some(eps) = &cfg.execution_providers {
            let providers = Self::build_execution_providers(eps)?;
            if !providers.is_empty() {
                builder = builder.with_execution_providers(providers)?;
            }
        }
        Ok(builder)
    }

    fn build_execution_providers(
        eps: &[OrtExecutionProvider],
    ) -> Result<Vec<ExecutionProviderDispatch>, ort::Error> {
        let mut providers = Vec::new();
        for ep in eps {
            match ep {
                OrtExecutionProvider::CPU => {
                    providers
                        .push(ort::execution_providers::CPUExecutionProvider::default().build());
                }
                #[cfg(feature = "cuda")]
                OrtExecutionProvider::CUDA { device_id } => {
                    let mut cuda_provider =
                        ort::execution_providers::CUDAExecutionProvider::default();
                    if let Some(id) = device_id {
                        cuda_provider = cuda_provider.with_device_id(*id);
                    }
                    providers.push(cuda_provider.build());
                }
                #[cfg(not(feature = "cuda"))]
                OrtExecutionProvider::CUDA { .. } => {
                    return Err(ort::Error::new(
                        "CUDA execution provider requested but cuda feature is not enabled",
                    ));
                }
            }
        }
        Ok(providers)
    }
}
