//! Shared settings for the CLI and the web front-end.
//!
//! Resolution order: built-in defaults, then an optional TOML file
//! (`FACEACCESS_CONFIG`, or `faceaccess.toml` in the working directory),
//! then `FACEACCESS_*` environment variables.

use crate::deepfake::DEEPFAKE_MODEL_FILE;
use crate::provider::DEFAULT_TOLERANCE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "faceaccess.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory of `<name>.jpg|.jpeg|.png` registration images.
    pub known_faces_dir: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Maximum encoding distance for a positive match.
    pub match_tolerance: f32,
    /// Camera index tried first (`/dev/videoN`).
    pub camera_index: u32,
    /// Camera index tried when the first one yields no frame.
    pub fallback_camera_index: Option<u32>,
    /// Frames discarded after opening a camera while exposure settles.
    pub warmup_frames: usize,
    /// TTF/OTF font for overlay labels.
    pub font_path: Option<PathBuf>,
    /// Address the web front-end listens on.
    pub bind_addr: String,
    /// Seconds a captured snapshot waits for confirmation.
    pub snapshot_ttl_secs: u64,
    /// Maximum number of snapshots awaiting confirmation.
    pub snapshot_capacity: usize,
    /// Program launched by the web front-end for live recognition.
    pub recognizer_program: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            known_faces_dir: PathBuf::from("known_faces"),
            model_dir: default_model_dir(),
            match_tolerance: DEFAULT_TOLERANCE,
            camera_index: 0,
            fallback_camera_index: Some(1),
            warmup_frames: 2,
            font_path: None,
            bind_addr: "127.0.0.1:5000".to_string(),
            snapshot_ttl_secs: 600,
            snapshot_capacity: 16,
            recognizer_program: None,
        }
    }
}

/// `$XDG_DATA_HOME/faceaccess/models`, or `./models` when no home is known.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local/share")))
        .map(|d| d.join("faceaccess/models"))
        .unwrap_or_else(|_| PathBuf::from("models"))
}

impl Settings {
    /// Load settings from the default file location and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("FACEACCESS_CONFIG").ok().map(PathBuf::from);
        let path = explicit.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut settings = if explicit.is_some() || path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Parse a TOML settings file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded settings file");
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override fields from `FACEACCESS_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("FACEACCESS_KNOWN_FACES_DIR") {
            self.known_faces_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FACEACCESS_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FACEACCESS_FONT_PATH") {
            self.font_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("FACEACCESS_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Ok(v) = std::env::var("FACEACCESS_RECOGNIZER_PROGRAM") {
            self.recognizer_program = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("FACEACCESS_FALLBACK_CAMERA_INDEX") {
            match parse_optional_index(&v) {
                Some(fallback) => self.fallback_camera_index = fallback,
                None => tracing::warn!(value = %v, "ignoring unparsable FACEACCESS_FALLBACK_CAMERA_INDEX"),
            }
        }
        self.match_tolerance = env_parse("FACEACCESS_MATCH_TOLERANCE", self.match_tolerance);
        self.camera_index = env_parse("FACEACCESS_CAMERA_INDEX", self.camera_index);
        self.warmup_frames = env_parse("FACEACCESS_WARMUP_FRAMES", self.warmup_frames);
        self.snapshot_ttl_secs = env_parse("FACEACCESS_SNAPSHOT_TTL_SECS", self.snapshot_ttl_secs);
        self.snapshot_capacity = env_parse("FACEACCESS_SNAPSHOT_CAPACITY", self.snapshot_capacity);
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join("det_10g.onnx")
    }

    /// Path to the ArcFace recognition model.
    pub fn recognizer_model_path(&self) -> PathBuf {
        self.model_dir.join("w600k_r50.onnx")
    }

    /// Path to the deepfake classifier model.
    pub fn deepfake_model_path(&self) -> PathBuf {
        self.model_dir.join(DEEPFAKE_MODEL_FILE)
    }

    /// Camera indices to try, in order.
    pub fn camera_indices(&self) -> Vec<u32> {
        let mut indices = vec![self.camera_index];
        if let Some(fallback) = self.fallback_camera_index.filter(|f| *f != self.camera_index) {
            indices.push(fallback);
        }
        indices
    }
}

/// `"none"` or an empty value disables the fallback camera; otherwise an
/// index. `None` when the value is neither.
fn parse_optional_index(value: &str) -> Option<Option<u32>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    value.parse().ok().map(Some)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
