//! faceaccess-hw — Camera capture, frame sources and the preview window.
//!
//! Provides V4L2-based camera access, pixel-format conversion to RGB,
//! playback of image sequences and video files (via ffmpeg) and a minifb
//! preview window.

pub mod camera;
pub mod display;
pub mod frame;
pub mod source;
pub mod video;

pub use camera::{capture_snapshot, Camera, CameraError, DeviceInfo, PixelFormat};
pub use display::{DisplayError, PreviewWindow, WindowEvent};
pub use frame::Frame;
pub use source::{FrameSource, ImageSequence, SourceError};
pub use video::{open_recording, VideoFile};
