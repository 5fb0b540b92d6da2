//! Command-line interface for human and hand detection.
//!
//! # Usage
//!
//! ```bash
//! human-hand-detect run --config config.json --max-frames 300 --output-dir out --vis
//! human-hand-detect check --config config.json --image sample.jpg
//! human-hand-detect unpack --bundle gesture_recognizer.task --out models/gesture
//! human-hand-detect export --model yolo11n.pt
//! ```

use clap::{Parser, Subcommand};
use human_hand_detect::assets::{YoloExport, unpack_task_bundle, verify_gesture_layout};
use human_hand_detect::config::AppConfig;
use human_hand_detect::core::config::{OrtExecutionProvider, OrtSessionConfig};
use human_hand_detect::core::inference::{OrtInfer, load_session};
use human_hand_detect::core::tensor::Tensor4D;
use human_hand_detect::core::init_tracing;
use human_hand_detect::pipeline::HumanHandPipeline;
use human_hand_detect::utils::{load_image, save_visualization};
use human_hand_detect::video::VideoCapture;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Human and hand detection on video streams.
#[derive(Parser)]
#[command(name = "human-hand-detect")]
#[command(about = "Human and Hand Detection CLI", version)]
struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run detection over the configured video source.
    Run {
        /// Path to the configuration file
        #[arg(long)]
        config: PathBuf,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,

        /// Override the configured video source
        #[arg(long)]
        source: Option<String>,

        /// Device for inference: cpu, cuda or cuda:N
        #[arg(long)]
        device: Option<String>,

        /// Directory for visualizations and JSON results
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Save annotated frames to the output directory
        #[arg(long)]
        vis: bool,

        /// Save per-frame results as JSON to the output directory
        #[arg(long)]
        dump_json: bool,
    },

    /// Validate the configuration and load every model.
    Check {
        /// Path to the configuration file
        #[arg(long)]
        config: PathBuf,

        /// Run one inference on this image
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Unpack a MediaPipe .task bundle.
    Unpack {
        /// The .task file
        #[arg(long)]
        bundle: PathBuf,

        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },

    /// Export a YOLO checkpoint to ONNX with the Ultralytics CLI.
    Export {
        /// The .pt checkpoint
        #[arg(long)]
        model: PathBuf,

        /// Export image size
        #[arg(long)]
        imgsz: Option<u32>,

        /// Ultralytics executable
        #[arg(long, default_value = "yolo")]
        yolo_bin: String,
    },

    /// Download a model file.
    #[cfg(feature = "download")]
    Download {
        /// URL to fetch
        #[arg(long)]
        url: String,

        /// Destination file
        #[arg(long)]
        dest: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Command::Run {
            config,
            max_frames,
            source,
            device,
            output_dir,
            vis,
            dump_json,
        } => run(RunArgs {
            config,
            max_frames,
            source,
            device,
            output_dir,
            vis,
            dump_json,
        }),
        Command::Check { config, image } => check(&config, image.as_deref()),
        Command::Unpack { bundle, out } => unpack(&bundle, &out),
        Command::Export {
            model,
            imgsz,
            yolo_bin,
        } => export(model, imgsz, yolo_bin),
        #[cfg(feature = "download")]
        Command::Download { url, dest } => {
            human_hand_detect::assets::download_file(&url, &dest).map(|_| ())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                error!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

struct RunArgs {
    config: PathBuf,
    max_frames: Option<u64>,
    source: Option<String>,
    device: Option<String>,
    output_dir: Option<PathBuf>,
    vis: bool,
    dump_json: bool,
}

fn load_config(path: &Path) -> human_hand_detect::DetectResult<AppConfig> {
    if !path.exists() {
        error!("Configuration file {} does not exist.", path.display());
    }
    AppConfig::from_file(path)
}

fn run(args: RunArgs) -> human_hand_detect::DetectResult<()> {
    let mut config = load_config(&args.config)?;
    if let Some(source) = args.source {
        config = config.with_video_source(source);
    }
    if let Some(device) = args.device.as_deref() {
        match OrtExecutionProvider::parse_device(device) {
            Some(providers) => {
                let ort = config
                    .ort()
                    .cloned()
                    .unwrap_or_else(OrtSessionConfig::new)
                    .with_execution_providers(providers);
                config = config.with_ort(ort);
            }
            None => warn!("Unsupported device '{}', using the configured one", device),
        }
    }

    let output_dir = match (&args.output_dir, args.vis || args.dump_json) {
        (Some(dir), _) => Some(dir.clone()),
        (None, true) => Some(PathBuf::from("output")),
        (None, false) => None,
    };
    if let Some(dir) = &output_dir {
        fs::create_dir_all(dir)?;
    }

    let mut pipeline = HumanHandPipeline::from_config(&config)?;
    let mut capture = VideoCapture::new(config.video_source(), config.video_fps());
    info!("Processing {}", capture.source());

    let stats = pipeline.run(&mut capture, args.max_frames, |frame, result| {
        info!("{}", result);
        let Some(dir) = &output_dir else {
            return Ok(());
        };
        if args.vis {
            let path = dir.join(format!("frame_{:06}.png", frame.index));
            save_visualization(&path, &frame.image, result)?;
        }
        if args.dump_json {
            let path = dir.join(format!("frame_{:06}.json", frame.index));
            fs::write(path, serde_json::to_string_pretty(result)?)?;
        }
        Ok(())
    })?;

    info!("{}", stats);
    Ok(())
}

fn check(config_path: &Path, image: Option<&Path>) -> human_hand_detect::DetectResult<()> {
    let config = load_config(config_path)?;
    for (name, path) in config.model_paths() {
        let session = load_session(path)?;
        let inputs: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        let outputs: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        info!(
            "{}: {} (inputs {:?}, outputs {:?})",
            name,
            path.display(),
            inputs,
            outputs
        );
    }

    // Blank-input forward pass to confirm the detector's output layout.
    let (w, h) = config.yolo_input_size();
    let yolo = OrtInfer::new(config.yolo_onnx_path(), None)?;
    let blank = Tensor4D::zeros((1, 3, h as usize, w as usize));
    info!("{} output shape {:?}", yolo.model_name(), yolo.infer_3d(&blank)?.shape());

    let mut pipeline = HumanHandPipeline::from_config(&config)?;
    info!("All models loaded.");

    if let Some(path) = image {
        let image = load_image(path)?;
        let result = pipeline.process_frame(&image)?;
        info!("{}", result);
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

fn unpack(bundle: &Path, out: &Path) -> human_hand_detect::DetectResult<()> {
    let layout = unpack_task_bundle(bundle, out)?;
    for dir in &layout.subdirectories {
        info!("  {}/", dir.display());
    }
    for file in &layout.tflite_files {
        info!("  {}", file.display());
    }
    match verify_gesture_layout(out) {
        Ok(files) => {
            info!("Hand Gesture Recognizer layout found.");
            for onnx in files.onnx_paths() {
                info!("Convert to ONNX at {}", onnx.display());
            }
        }
        Err(e) => warn!("{}", e),
    }
    Ok(())
}

fn export(
    model: PathBuf,
    imgsz: Option<u32>,
    yolo_bin: String,
) -> human_hand_detect::DetectResult<()> {
    let mut export = YoloExport::new(model).with_yolo_bin(yolo_bin);
    if let Some(imgsz) = imgsz {
        export = export.with_imgsz(imgsz);
    }
    let path = export.run()?;
    println!("{}", path.display());
    Ok(())
}
