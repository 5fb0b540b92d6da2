//! Core building blocks of the detection pipeline.
//!
//! This module contains:
//! - Error handling ([`errors`])
//! - Configuration primitives and ONNX Runtime settings ([`config`])
//! - The ONNX Runtime inference engine ([`inference`])
//! - Tensor aliases shared between preprocessing and inference ([`tensor`])

pub mod config;
pub mod errors;
pub mod inference;
pub mod tensor;

pub use config::{ConfigError, ConfigValidator, OrtExecutionProvider, OrtSessionConfig};
pub use errors::{DetectError, DetectResult, ProcessingStage, SimpleError};
pub use inference::{InferenceEngine, OrtInfer, load_session};
pub use tensor::{NamedOutput, Tensor2D, Tensor3D, Tensor4D};

use std::sync::atomic::{AtomicBool, Ordering};

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence when set; otherwise the level is `debug` when
/// `verbose` is true and `info` when it is not. Only the first call installs
/// a subscriber; later calls return `false` and change nothing.
pub fn init_tracing(verbose: bool) -> bool {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    if TRACING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return false;
    }

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok();

    if installed {
        if verbose {
            tracing::debug!("Logging configured to DEBUG level.");
        } else {
            tracing::info!("Logging configured to INFO level.");
        }
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(true);
        assert!(!init_tracing(false));
    }
}
