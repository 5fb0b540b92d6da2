//! YOLO model export through the Ultralytics CLI.
//!
//! Wraps `yolo export model=<file>.pt format=onnx`, which writes the
//! converted model next to the checkpoint.

use crate::core::errors::{DetectError, DetectResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// An export of a `.pt` checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YoloExport {
    pub model: PathBuf,
    pub format: String,
    pub imgsz: Option<u32>,
    pub yolo_bin: String,
}

impl YoloExport {
    /// ONNX export with the default image size, using `yolo` from `PATH`.
    pub fn new(model: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            format: "onnx".to_string(),
            imgsz: None,
            yolo_bin: "yolo".to_string(),
        }
    }

    pub fn with_imgsz(mut self, imgsz: u32) -> Self {
        self.imgsz = Some(imgsz);
        self
    }

    pub fn with_yolo_bin(mut self, bin: impl Into<String>) -> Self {
        self.yolo_bin = bin.into();
        self
    }

    /// Arguments passed to the `yolo` executable.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "export".to_string(),
            format!("model={}", self.model.display()),
            format!("format={}", self.format),
        ];
        if let Some(imgsz) = self.imgsz {
            args.push(format!("imgsz={}", imgsz));
        }
        args
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.yolo_bin);
        cmd.args(self.args());
        cmd
    }

    /// Where the exporter writes its result.
    pub fn output_path(&self) -> PathBuf {
        self.model.with_extension(&self.format)
    }

    /// Runs the export and returns the exported model path.
    pub fn run(&self) -> DetectResult<PathBuf> {
        if !self.model.is_file() {
            return Err(DetectError::invalid_input(format!(
                "model checkpoint not found: {}",
                self.model.display()
            )));
        }
        info!("Running: {} {}", self.yolo_bin, self.args().join(" "));

        let output = self.command().output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                DetectError::export_error(format!(
                    "'{}' not found; install it with `pip install ultralytics`",
                    self.yolo_bin
                ))
            } else {
                DetectError::Io(e)
            }
        })?;
        debug!("{}", String::from_utf8_lossy(&output.stdout));

        if !output.status.success() {
            return Err(DetectError::export_error(format!(
                "{} exited with {}: {}",
                self.yolo_bin,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let exported = self.output_path();
        check_exported(&exported)?;
        info!("Exported {}", exported.display());
        Ok(exported)
    }
}

fn check_exported(path: &Path) -> DetectResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DetectError::export_error(format!(
            "export finished but {} was not written",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let export = YoloExport::new("models/yolo11n.pt");
        assert_eq!(
            export.args(),
            vec!["export", "model=models/yolo11n.pt", "format=onnx"]
        );
        assert_eq!(export.output_path(), PathBuf::from("models/yolo11n.onnx"));

        let export = export.with_imgsz(320).with_yolo_bin("/opt/yolo");
        assert_eq!(export.args().last().map(String::as_str), Some("imgsz=320"));
        assert_eq!(export.command().get_program(), "/opt/yolo");
    }

    #[test]
    fn test_missing_checkpoint() {
        let err = YoloExport::new("does/not/exist.pt").run().unwrap_err();
        assert!(matches!(err, DetectError::InvalidInput { .. }));
    }

    #[test]
    fn test_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("yolo11n.pt");
        std::fs::write(&model, b"weights").unwrap();

        let err = YoloExport::new(&model)
            .with_yolo_bin("definitely-not-a-yolo-binary")
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
