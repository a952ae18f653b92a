//! Deepfake image classifier.
//!
//! Scores frames with an ONNX export of a fine-tuned EfficientNet-B0
//! (ImageNet backbone, dropout 0.4 and a 2-unit head) and averages the
//! per-frame class probabilities. Frames are independent, equally weighted
//! votes.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::fmt;
use std::path::Path;
use thiserror::Error;

pub const DEEPFAKE_MODEL_FILE: &str = "deepfake_efficientnet_b0.onnx";

const INPUT_SIZE: u32 = 224;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
const NUM_CLASSES: usize = 2;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("no frames provided for prediction")]
    NoFrames,
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Predicted class. The discriminants are the model's class indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Authentic = 0,
    Manipulated = 1,
}

impl Verdict {
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Authentic => f.write_str("REAL"),
            Verdict::Manipulated => f.write_str("FAKE"),
        }
    }
}

/// Averaged classification over a batch of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: Verdict,
    /// `[p_authentic, p_manipulated]`.
    pub probabilities: [f32; NUM_CLASSES],
}

/// Produces class probabilities for a single frame.
pub trait FrameScorer {
    fn class_probabilities(&mut self, frame: &RgbImage) -> Result<[f32; NUM_CLASSES], ClassifierError>;
}

/// Score every frame independently and average the probabilities.
pub fn predict_frames(frames: &[RgbImage], scorer: &mut dyn FrameScorer) -> Result<Prediction, ClassifierError> {
    if frames.is_empty() {
        return Err(ClassifierError::NoFrames);
    }

    let mut sum = [0.0f32; NUM_CLASSES];
    for frame in frames {
        let probs = scorer.class_probabilities(frame)?;
        for (acc, p) in sum.iter_mut().zip(probs) {
            *acc += p;
        }
    }
    let probabilities = sum.map(|s| s / frames.len() as f32);

    let label = if probabilities[1] > probabilities[0] {
        Verdict::Manipulated
    } else {
        Verdict::Authentic
    };

    tracing::debug!(frames = frames.len(), ?probabilities, %label, "deepfake prediction");
    Ok(Prediction { label, probabilities })
}

/// ONNX-backed deepfake classifier.
pub struct DeepfakeClassifier {
    session: Session,
}

impl DeepfakeClassifier {
    /// Load the classifier. Failure here is fatal; there is no fallback model.
    pub fn load(model_path: &Path) -> Result<Self, ClassifierError> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), device = Self::device(), "loaded deepfake model");
        Ok(Self { session })
    }

    /// Execution device the session runs on.
    pub fn device() -> &'static str {
        "cpu"
    }
}

impl FrameScorer for DeepfakeClassifier {
    fn class_probabilities(&mut self, frame: &RgbImage) -> Result<[f32; NUM_CLASSES], ClassifierError> {
        let input = preprocess(frame);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("logits: {e}")))?;

        let logits: [f32; NUM_CLASSES] = logits.try_into().map_err(|_| {
            ClassifierError::InferenceFailed(format!("expected {NUM_CLASSES} logits, got {}", logits.len()))
        })?;
        Ok(softmax(logits))
    }
}

fn softmax(logits: [f32; NUM_CLASSES]) -> [f32; NUM_CLASSES] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = logits.map(|l| (l - max).exp());
    let total: f32 = exp.iter().sum();
    exp.map(|e| e / total)
}

/// Resize to 224×224 and normalise with ImageNet statistics into NCHW.
fn preprocess(frame: &RgbImage) -> Array4<f32> {
    let resized = imageops::resize(frame, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    let size = INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    tensor
}
