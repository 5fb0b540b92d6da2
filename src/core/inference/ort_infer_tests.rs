use super::*;
use crate::core::config::OrtSessionConfig;

#[test]
fn test_new_rejects_missing_model() {
    let result = OrtInfer::new("dummy_path.onnx", None);
    assert!(matches!(result, Err(DetectError::ModelLoad { .. })));
}

#[test]
fn test_from_config_respects_missing_model() {
    let config = OrtSessionConfig::new().with_session_pool_size(3);
    let result = OrtInfer::from_config(&config, "dummy_path.onnx", Some("images"));
    assert!(result.is_err());
}

#[test]
fn test_output_to_tensor3d_checks_len() {
    let ok = NamedOutput::new("out", vec![1, 2, 3], vec![0.0; 6]);
    let tensor = output_to_tensor3d("m", &ok).unwrap();
    assert_eq!(tensor.shape(), &[1, 2, 3]);

    let short = NamedOutput::new("out", vec![1, 2, 3], vec![0.0; 5]);
    assert!(output_to_tensor3d("m", &short).is_err());

    let flat = NamedOutput::new("out", vec![6], vec![0.0; 6]);
    assert!(output_to_tensor3d("m", &flat).is_err());
}
