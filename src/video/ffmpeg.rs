//! Video decoding through an `ffmpeg` child process.
//!
//! `ffprobe` supplies the frame size, then `ffmpeg` decodes the input into
//! raw `rgb24` frames on its stdout, resampled to the target frame rate.

use super::{Frame, FrameSource, VideoSource, timestamp_ms};
use crate::core::errors::{DetectError, DetectResult};
use image::RgbImage;
use serde::Deserialize;
use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Extracts the first video stream's size from `ffprobe -print_format json` output.
pub fn parse_probe_dimensions(json: &str) -> DetectResult<(u32, u32)> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    probe
        .streams
        .iter()
        .find_map(|s| match (s.width, s.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        })
        .ok_or_else(|| DetectError::source_error("ffprobe reported no video stream"))
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Input arguments selecting `source`, ending with `-i <input>`.
pub fn input_args(source: &VideoSource) -> Vec<String> {
    match source {
        VideoSource::Camera(idx) => {
            if cfg!(target_os = "macos") {
                let mut args = strings(&["-f", "avfoundation", "-i"]);
                args.push(idx.to_string());
                args
            } else if cfg!(target_os = "windows") {
                let mut args = strings(&["-f", "dshow", "-video_device_number"]);
                args.push(idx.to_string());
                args.extend(strings(&["-i", "video="]));
                args
            } else {
                let mut args = strings(&["-f", "v4l2", "-i"]);
                args.push(format!("/dev/video{idx}"));
                args
            }
        }
        VideoSource::File(path) | VideoSource::ImageDir(path) => {
            vec!["-i".to_string(), path.to_string_lossy().into_owned()]
        }
        VideoSource::Url(url) => vec!["-i".to_string(), url.clone()],
    }
}

/// Full `ffmpeg` argument list decoding `source` to raw RGB at `fps`.
pub fn decode_args(source: &VideoSource, fps: u32) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-loglevel", "error"]);
    args.extend(input_args(source));
    args.extend(strings(&["-an", "-vf"]));
    args.push(format!("fps={}", fps.max(1)));
    args.extend(strings(&["-f", "rawvideo", "-pix_fmt", "rgb24", "-"]));
    args
}

/// Frames decoded by an `ffmpeg` subprocess.
#[derive(Debug)]
pub struct FfmpegSource {
    source: VideoSource,
    fps: u32,
    ffmpeg_bin: String,
    ffprobe_bin: String,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    dimensions: Option<(u32, u32)>,
    next_index: u64,
}

impl FfmpegSource {
    pub fn new(source: VideoSource, fps: u32) -> Self {
        Self {
            source,
            fps,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            child: None,
            stdout: None,
            dimensions: None,
            next_index: 0,
        }
    }

    /// Overrides the `ffmpeg` and `ffprobe` executables.
    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg_bin = ffmpeg.into();
        self.ffprobe_bin = ffprobe.into();
        self
    }

    fn probe(&self) -> DetectResult<(u32, u32)> {
        let mut args = strings(&[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-print_format",
            "json",
        ]);
        args.extend(input_args(&self.source));

        let output = Command::new(&self.ffprobe_bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                DetectError::source_error(format!("failed to run {}: {e}", self.ffprobe_bin))
            })?;

        if !output.status.success() {
            return Err(DetectError::source_error(format!(
                "Failed to open video source: {} ({})",
                self.source,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_probe_dimensions(&String::from_utf8_lossy(&output.stdout))
    }

    fn frame_len(&self) -> Option<usize> {
        self.dimensions.map(|(w, h)| w as usize * h as usize * 3)
    }
}

impl FrameSource for FfmpegSource {
    fn open(&mut self) -> DetectResult<()> {
        self.close();
        let dimensions = self.probe()?;

        let mut child = Command::new(&self.ffmpeg_bin)
            .args(decode_args(&self.source, self.fps))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                DetectError::source_error(format!("failed to run {}: {e}", self.ffmpeg_bin))
            })?;

        self.stdout = child.stdout.take();
        self.child = Some(child);
        self.dimensions = Some(dimensions);
        self.next_index = 0;
        debug!("Video source opened: {}", self.source);
        Ok(())
    }

    fn read(&mut self) -> DetectResult<Option<Frame>> {
        let (Some(len), Some((width, height))) = (self.frame_len(), self.dimensions) else {
            return Err(DetectError::invalid_input("read() called before open()"));
        };
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(DetectError::invalid_input("read() called before open()"));
        };

        let mut buffer = vec![0u8; len];
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            DetectError::source_error(format!("frame buffer does not match {width}x{height}"))
        })?;
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(Frame {
            index,
            timestamp_ms: timestamp_ms(index, self.fps),
            image,
        }))
    }

    fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill()
                && e.kind() != ErrorKind::InvalidInput
            {
                warn!("failed to stop ffmpeg: {e}");
            }
            let _ = child.wait();
        }
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.close();
    }
}
