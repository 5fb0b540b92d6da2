//! ONNX Runtime configuration types.

use serde::{Deserialize, Serialize};

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    #[default]
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
}

/// Execution providers for ONNX Runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum OrtExecutionProvider {
    /// CPU execution provider (always available)
    #[default]
    CPU,
    /// NVIDIA CUDA execution provider (requires the `cuda` feature)
    CUDA {
        /// CUDA device ID (default: 0)
        device_id: Option<i32>,
    },
}

impl OrtExecutionProvider {
    /// Parses device strings such as `cpu`, `cuda` or `cuda:1`.
    pub fn parse_device(device: &str) -> Option<Vec<OrtExecutionProvider>> {
        let device = device.trim().to_lowercase();
        if device == "cpu" {
            return Some(vec![OrtExecutionProvider::CPU]);
        }
        if device == "cuda" {
            return Some(vec![
                OrtExecutionProvider::CUDA { device_id: Some(0) },
                OrtExecutionProvider::CPU,
            ]);
        }
        let id = device.strip_prefix("cuda:")?.parse::<i32>().ok()?;
        Some(vec![
            OrtExecutionProvider::CUDA {
                device_id: Some(id),
            },
            OrtExecutionProvider::CPU,
        ])
    }
}

/// Configuration for ONNX Runtime sessions.
///
/// Every field is optional; unset fields keep ONNX Runtime's own defaults.
/// The struct deserializes from the optional `"ort"` object of the
/// application config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes
    pub inter_threads: Option<usize>,
    /// Graph optimization level
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in order of preference
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
    /// Number of sessions created per model for concurrent callers
    pub session_pool_size: Option<usize>,
}

impl OrtSessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    pub fn with_execution_providers(mut self, providers: Vec<OrtExecutionProvider>) -> Self {
        self.execution_providers = Some(providers);
        self
    }

    pub fn with_session_pool_size(mut self, size: usize) -> Self {
        self.session_pool_size = Some(size);
        self
    }

    /// Effective session pool size (at least one).
    pub fn pool_size(&self) -> usize {
        self.session_pool_size.unwrap_or(1).max(1)
    }

    /// Effective execution providers, defaulting to CPU only.
    pub fn get_execution_providers(&self) -> Vec<OrtExecutionProvider> {
        self.execution_providers
            .clone()
            .unwrap_or_else(|| vec![OrtExecutionProvider::CPU])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ort_session_config_builder() {
        let config = OrtSessionConfig::new()
            .with_intra_threads(4)
            .with_inter_threads(2)
            .with_optimization_level(OrtGraphOptimizationLevel::Level2)
            .with_session_pool_size(0);

        assert_eq!(config.intra_threads, Some(4));
        assert_eq!(config.inter_threads, Some(2));
        assert_eq!(config.pool_size(), 1);
        assert_eq!(
            config.get_execution_providers(),
            vec![OrtExecutionProvider::CPU]
        );
    }

    #[test]
    fn test_parse_device() {
        assert_eq!(
            OrtExecutionProvider::parse_device("CPU"),
            Some(vec![OrtExecutionProvider::CPU])
        );
        let cuda = OrtExecutionProvider::parse_device("cuda:1").unwrap();
        assert_eq!(
            cuda[0],
            OrtExecutionProvider::CUDA {
                device_id: Some(1)
            }
        );
        assert!(OrtExecutionProvider::parse_device("tpu").is_none());
        assert!(OrtExecutionProvider::parse_device("cuda:x").is_none());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: OrtSessionConfig =
            serde_json::from_str(r#"{"intra_threads": 2, "execution_providers": ["CPU"]}"#)
                .unwrap();
        assert_eq!(config.intra_threads, Some(2));
        assert!(config.optimization_level.is_none());
        assert_eq!(config.get_execution_providers().len(), 1);
    }
}
