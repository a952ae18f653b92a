//! Frame sources for display loops: a live camera, or a recording (image
//! sequence or video file) played back as a simulated webcam.

use crate::camera::{Camera, CameraError};
use crate::frame::Frame;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SEQUENCE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read frame {path}: {source}")]
    Image {
        path: String,
        source: image::ImageError,
    },
    #[error("no frames found in {0}")]
    Empty(String),
    #[error("video: {0}")]
    Video(String),
}

/// Something that yields frames one at a time.
pub trait FrameSource {
    /// Next frame, or `None` at end of stream. Blocks until available.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

impl FrameSource for Camera {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(Some(self.capture_frame()?))
    }
}

/// Image files of a directory, in file-name order.
pub struct ImageSequence {
    frames: Vec<PathBuf>,
    position: usize,
}

impl ImageSequence {
    pub fn open(directory: &Path) -> Result<Self, SourceError> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| SEQUENCE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
            })
            .collect();
        if frames.is_empty() {
            return Err(SourceError::Empty(directory.display().to_string()));
        }
        frames.sort();
        tracing::info!(dir = %directory.display(), frames = frames.len(), "opened image sequence");
        Ok(Self { frames, position: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let image = image::open(path)
            .map_err(|source| SourceError::Image {
                path: path.display().to_string(),
                source,
            })?
            .to_rgb8();
        let sequence = self.position as u32;
        self.position += 1;
        Ok(Some(Frame::new(image, sequence)))
    }
}
