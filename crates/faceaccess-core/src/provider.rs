//! Face encoding provider seam.
//!
//! Everything above this module treats detection and encoding as a black box:
//! give it an RGB image, get back located faces with their encodings.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{DetectedFace, Encoding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

/// Default same/different distance threshold for L2-normalised ArcFace
/// encodings. Equivalent to a cosine similarity of about 0.40.
pub const DEFAULT_TOLERANCE: f32 = 1.10;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("encoding provider unavailable: {0}")]
    Unavailable(String),
}

/// Locates faces in an image and encodes each one.
pub trait EncodingProvider {
    /// Detected faces with their encodings, most prominent first.
    fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ProviderError>;

    /// Maximum encoding distance still considered the same person.
    fn tolerance(&self) -> f32 {
        DEFAULT_TOLERANCE
    }
}

/// Euclidean distance from `probe` to every known encoding, in order.
pub fn face_distance(known: &[Encoding], probe: &Encoding) -> Vec<f32> {
    known.iter().map(|k| k.distance(probe)).collect()
}

/// Whether each known encoding is within `tolerance` of `probe`.
pub fn compare_faces(known: &[Encoding], probe: &Encoding, tolerance: f32) -> Vec<bool> {
    face_distance(known, probe)
        .into_iter()
        .map(|d| d <= tolerance)
        .collect()
}

/// SCRFD + ArcFace provider backed by ONNX Runtime.
pub struct OnnxEncodingProvider {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    tolerance: f32,
}

impl OnnxEncodingProvider {
    /// Load both models. A missing model file is fatal.
    pub fn load(detector_path: &Path, recognizer_path: &Path, tolerance: f32) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(detector_path)?;
        let recognizer = FaceRecognizer::load(recognizer_path)?;
        tracing::info!(tolerance, "encoding provider ready");
        Ok(Self { detector, recognizer, tolerance })
    }
}

impl EncodingProvider for OnnxEncodingProvider {
    fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ProviderError> {
        let detections = self.detector.detect(image)?;
        let mut faces = Vec::with_capacity(detections.len());
        for det in &detections {
            if det.landmarks.is_none() {
                tracing::debug!(confidence = det.confidence, "skipping detection without landmarks");
                continue;
            }
            let encoding = self.recognizer.extract(image, det)?;
            faces.push(DetectedFace {
                location: det.location(image.width(), image.height()),
                encoding,
            });
        }
        Ok(faces)
    }

    fn tolerance(&self) -> f32 {
        self.tolerance
    }
}
