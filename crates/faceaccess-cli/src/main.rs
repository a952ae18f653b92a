use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use faceaccess_core::{
    predict_frames, register_identity, sanitize_name, DeepfakeClassifier, KnownFaces, OnnxEncodingProvider,
    OverlayStyle, Settings,
};
use faceaccess_hw::{open_recording, Camera, FrameSource};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod session;

use session::{LoopEnd, Recognition};

/// Delay between frames when playing back a recording.
const PLAYBACK_FRAME_DELAY: Duration = Duration::from_millis(25);

#[derive(Parser)]
#[command(name = "faceaccess", version, about = "Webcam face registration and recognition")]
struct Cli {
    /// Settings file (defaults to $FACEACCESS_CONFIG or ./faceaccess.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the live camera feed
    Show {
        /// Camera index (/dev/videoN)
        #[arg(short, long)]
        device: Option<u32>,
    },
    /// Play a recording as a simulated webcam
    Play {
        /// Video file (decoded with ffmpeg), or a directory of frames played in file-name order
        path: PathBuf,
    },
    /// Recognize registered faces in a live or recorded feed
    Recognize {
        /// Camera index (/dev/videoN)
        #[arg(short, long, conflicts_with = "frames")]
        device: Option<u32>,
        /// Video file or directory of frames to use instead of a camera
        #[arg(long)]
        frames: Option<PathBuf>,
    },
    /// Register a face: Space or Enter saves the current frame
    Register {
        /// Username; reduced to letters, digits, '-' and '_'
        name: String,
        /// Camera index (/dev/videoN)
        #[arg(short, long)]
        device: Option<u32>,
    },
    /// Classify images as real or manipulated
    Classify {
        /// Image files; probabilities are averaged across all of them
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Classifier model (defaults to the model directory)
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// List registered identities
    List,
    /// List V4L2 capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Show { device } => {
            let index = device.unwrap_or(settings.camera_index);
            let mut camera = Camera::open(index).with_context(|| format!("cannot open camera {index}"))?;
            session::run_display(&mut camera, "Webcam", None, |frame| frame.clone())?;
        }
        Commands::Play { path } => {
            let mut recording =
                open_recording(&path).with_context(|| format!("cannot open recording {}", path.display()))?;
            let end = session::run_display(
                recording.as_mut(),
                "Simulated webcam",
                Some(PLAYBACK_FRAME_DELAY),
                |frame| frame.clone(),
            )?;
            if end == LoopEnd::EndOfStream {
                println!("End of recording");
            }
        }
        Commands::Recognize { device, frames } => {
            let (mut source, delay): (Box<dyn FrameSource>, Option<Duration>) = match frames {
                Some(path) => (
                    open_recording(&path).with_context(|| format!("cannot open recording {}", path.display()))?,
                    Some(PLAYBACK_FRAME_DELAY),
                ),
                None => {
                    let index = device.unwrap_or(settings.camera_index);
                    let camera = Camera::open(index).with_context(|| format!("cannot open camera {index}"))?;
                    (Box::new(camera), None)
                }
            };

            let mut provider = load_provider(&settings)?;
            let known = KnownFaces::load(&settings.known_faces_dir, &mut provider)
                .with_context(|| format!("loading known faces from {}", settings.known_faces_dir.display()))?;
            if known.is_empty() {
                tracing::warn!("no registered faces; everyone will be labelled Unknown");
            }

            let mut recognition = Recognition::new(known, Box::new(provider), overlay_style(&settings));
            session::run_display(source.as_mut(), "Face recognition", delay, |frame| {
                recognition.annotate(frame)
            })?;
        }
        Commands::Register { name, device } => {
            let Some(sanitized) = sanitize_name(&name) else {
                bail!("invalid username {name:?}: use letters, digits, '-' or '_'");
            };
            let index = device.unwrap_or(settings.camera_index);
            let mut camera = Camera::open(index).with_context(|| format!("cannot open camera {index}"))?;
            println!("Registering '{sanitized}': press Space or Enter to capture, q to cancel");

            match session::capture_on_keypress(&mut camera, "Register face")? {
                Some(image) => {
                    drop(camera);
                    let saved = register_identity(&settings.known_faces_dir, &name, &image)
                        .context("saving registration image")?;
                    println!("User '{saved}' registered.");
                }
                None => println!("Registration cancelled"),
            }
        }
        Commands::Classify { images, model } => {
            let frames = images
                .iter()
                .map(|path| {
                    image::open(path)
                        .map(|img| img.to_rgb8())
                        .with_context(|| format!("cannot read {}", path.display()))
                })
                .collect::<Result<Vec<_>>>()?;

            let model_path = model.unwrap_or_else(|| settings.deepfake_model_path());
            let mut classifier = DeepfakeClassifier::load(&model_path)?;
            let prediction = predict_frames(&frames, &mut classifier)?;
            println!(
                "Prediction: {} (real {:.3}, fake {:.3}) over {} image(s) on {}",
                prediction.label,
                prediction.probabilities[0],
                prediction.probabilities[1],
                frames.len(),
                DeepfakeClassifier::device()
            );
        }
        Commands::List => {
            let mut provider = load_provider(&settings)?;
            let known = KnownFaces::load(&settings.known_faces_dir, &mut provider)?;
            if known.is_empty() {
                println!("No faces registered in {}", settings.known_faces_dir.display());
            } else {
                println!("{} registered face(s):", known.len());
                for name in known.names() {
                    println!("  {name}");
                }
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for dev in devices {
                println!("/dev/video{}  {}  ({}, {})", dev.index, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}

fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    match explicit {
        Some(path) => {
            let mut settings = Settings::from_file(path)?;
            settings.apply_env();
            Ok(settings)
        }
        None => Ok(Settings::load()?),
    }
}

fn load_provider(settings: &Settings) -> Result<OnnxEncodingProvider> {
    OnnxEncodingProvider::load(
        &settings.detector_model_path(),
        &settings.recognizer_model_path(),
        settings.match_tolerance,
    )
    .with_context(|| format!("loading face models from {}", settings.model_dir.display()))
}

/// Default colours, with label text when a font is configured and loads.
fn overlay_style(settings: &Settings) -> OverlayStyle {
    let Some(path) = &settings.font_path else {
        return OverlayStyle::default();
    };
    OverlayStyle::with_font_file(path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "label font unavailable; drawing boxes only");
        OverlayStyle::default()
    })
}
