//! faceaccess-core — Face registration, recognition and deepfake scoring.
//!
//! Faces are located with SCRFD and encoded with ArcFace, both via ONNX
//! Runtime, behind the [`EncodingProvider`] seam. On top of that sit the
//! known-face registry, the per-frame matcher, the alternate-frame scheduler
//! and the overlay renderer.

pub mod alignment;
pub mod config;
pub mod deepfake;
pub mod detector;
pub mod matcher;
pub mod overlay;
pub mod provider;
pub mod recognizer;
pub mod registry;
pub mod scheduler;
pub mod types;

pub use config::Settings;
pub use deepfake::{predict_frames, ClassifierError, DeepfakeClassifier, FrameScorer, Prediction, Verdict};
pub use matcher::match_frame;
pub use overlay::{render, render_or_passthrough, OverlayStyle};
pub use provider::{compare_faces, face_distance, EncodingProvider, OnnxEncodingProvider, ProviderError};
pub use registry::{register_identity, registered_names, sanitize_name, KnownFaces, RegistryError};
pub use scheduler::{FrameOutcome, FrameState, Phase};
pub use types::{DetectedFace, Encoding, FaceLocation, FaceMatch, Label, UNKNOWN_LABEL};
