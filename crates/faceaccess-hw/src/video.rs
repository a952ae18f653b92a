//! Video-file playback by piping raw RGB frames out of `ffmpeg`.
//!
//! `ffprobe` reports the stream size, then `ffmpeg` decodes to packed
//! `rgb24` on stdout; each `width * height * 3` bytes is one frame.

use crate::frame::{self, Frame};
use crate::source::{FrameSource, ImageSequence, SourceError};
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

/// Fixed-size raw RGB24 frames read back to back from a byte stream.
pub struct RawFrames<R> {
    reader: R,
    width: u32,
    height: u32,
    sequence: u32,
}

impl<R: Read> RawFrames<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
            sequence: 0,
        }
    }

    /// Next complete frame; a short trailing read ends the stream.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut buf = vec![0u8; (self.width * self.height * 3) as usize];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let image = frame::rgb24_to_rgb(&buf, self.width, self.height)
            .map_err(|e| SourceError::Video(e.to_string()))?;
        let sequence = self.sequence;
        self.sequence += 1;
        Ok(Some(Frame::new(image, sequence)))
    }
}

/// A video file decoded by an `ffmpeg` child process.
pub struct VideoFile {
    frames: RawFrames<BufReader<ChildStdout>>,
    child: Child,
}

impl VideoFile {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        if !path.is_file() {
            return Err(SourceError::Video(format!("{} is not a file", path.display())));
        }
        let (width, height) = probe_dimensions(path)?;

        let mut child = Command::new(FFMPEG)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SourceError::Video(format!("cannot run {FFMPEG}: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Video(format!("{FFMPEG} stdout unavailable")))?;

        tracing::info!(path = %path.display(), width, height, "opened video file");
        Ok(Self {
            frames: RawFrames::new(BufReader::new(stdout), width, height),
            child,
        })
    }
}

impl FrameSource for VideoFile {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        self.frames.read_frame()
    }
}

impl Drop for VideoFile {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::debug!(error = %e, "ffmpeg already exited");
        }
        let _ = self.child.wait();
    }
}

fn probe_dimensions(path: &Path) -> Result<(u32, u32), SourceError> {
    let output = Command::new(FFPROBE)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0:s=x",
        ])
        .arg(path)
        .output()
        .map_err(|e| SourceError::Video(format!("cannot run {FFPROBE}: {e}")))?;
    if !output.status.success() {
        return Err(SourceError::Video(format!(
            "{FFPROBE} failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_dimensions(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| SourceError::Video(format!("no video stream in {}", path.display())))
}

/// Parse `ffprobe`'s `WIDTHxHEIGHT` line.
fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (w, h) = line.split_once('x')?;
    let (w, h) = (w.trim().parse().ok()?, h.trim().parse().ok()?);
    (w > 0 && h > 0).then_some((w, h))
}

/// Open a recording: a directory of frames or a video file.
pub fn open_recording(path: &Path) -> Result<Box<dyn FrameSource>, SourceError> {
    if path.is_dir() {
        Ok(Box::new(ImageSequence::open(path)?))
    } else {
        Ok(Box::new(VideoFile::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("640x480\n"), Some((640, 480)));
        assert_eq!(parse_dimensions("\n 1280x720 \n"), Some((1280, 720)));
        assert_eq!(parse_dimensions(""), None);
        assert_eq!(parse_dimensions("0x480"), None);
        assert_eq!(parse_dimensions("N/A"), None);
    }

    #[test]
    fn test_raw_frames_split_stream_and_drop_partial_tail() {
        // two 2x1 frames, then half a frame
        let mut bytes: Vec<u8> = (0..12).collect();
        bytes.extend_from_slice(&[99, 99, 99]);
        let mut frames = RawFrames::new(Cursor::new(bytes), 2, 1);

        let first = frames.read_frame().unwrap().unwrap();
        assert_eq!(first.image.get_pixel(1, 0).0, [3, 4, 5]);
        assert_eq!(first.sequence, 0);
        let second = frames.read_frame().unwrap().unwrap();
        assert_eq!(second.image.get_pixel(0, 0).0, [6, 7, 8]);
        assert_eq!(second.sequence, 1);
        assert!(frames.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_open_missing_video() {
        let err = VideoFile::open(Path::new("/no/such/clip.mp4")).err().unwrap();
        assert!(matches!(err, SourceError::Video(_)));
    }

    #[test]
    fn test_open_recording_picks_directory() {
        let tmp = tempfile::tempdir().unwrap();
        image::RgbImage::new(2, 2).save(tmp.path().join("0001.png")).unwrap();
        let mut source = open_recording(tmp.path()).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }
}
