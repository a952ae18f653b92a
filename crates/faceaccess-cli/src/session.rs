//! Frame loops behind the interactive subcommands.

use anyhow::Result;
use faceaccess_core::{
    match_frame, render_or_passthrough, EncodingProvider, FrameOutcome, FrameState, KnownFaces, OverlayStyle,
};
use faceaccess_hw::{FrameSource, PreviewWindow, WindowEvent};
use image::RgbImage;
use std::time::Duration;

/// Why a display loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    Quit,
    EndOfStream,
}

/// Show frames from `source`, passed through `annotate`, until the user
/// quits or the source runs dry. The window is sized to the first frame.
pub fn run_display<F>(
    source: &mut dyn FrameSource,
    title: &str,
    frame_delay: Option<Duration>,
    mut annotate: F,
) -> Result<LoopEnd>
where
    F: FnMut(&RgbImage) -> RgbImage,
{
    let mut window: Option<PreviewWindow> = None;
    loop {
        let Some(frame) = source.next_frame()? else {
            tracing::info!("end of stream");
            return Ok(LoopEnd::EndOfStream);
        };
        let shown = annotate(&frame.image);

        let win = match window.as_mut() {
            Some(w) => w,
            None => window.insert(PreviewWindow::open(title, shown.width(), shown.height())?),
        };
        win.show(&shown)?;
        if win.poll() == WindowEvent::Quit {
            return Ok(LoopEnd::Quit);
        }
        if let Some(delay) = frame_delay {
            std::thread::sleep(delay);
        }
    }
}

/// Preview `source` until Space/Enter grabs a frame or the user quits.
pub fn capture_on_keypress(source: &mut dyn FrameSource, title: &str) -> Result<Option<RgbImage>> {
    let mut window: Option<PreviewWindow> = None;
    loop {
        let Some(frame) = source.next_frame()? else {
            return Ok(None);
        };
        let win = match window.as_mut() {
            Some(w) => w,
            None => window.insert(PreviewWindow::open(title, frame.width(), frame.height())?),
        };
        win.show(&frame.image)?;
        match win.poll() {
            WindowEvent::Quit => return Ok(None),
            WindowEvent::Capture => return Ok(Some(frame.image)),
            WindowEvent::None => {}
        }
    }
}

/// Live recognition state: recognizes every other frame and draws the
/// latest results on all of them.
pub struct Recognition {
    known: KnownFaces,
    provider: Box<dyn EncodingProvider>,
    style: OverlayStyle,
    state: FrameState,
}

impl Recognition {
    pub fn new(known: KnownFaces, provider: Box<dyn EncodingProvider>, style: OverlayStyle) -> Self {
        Self {
            known,
            provider,
            style,
            state: FrameState::new(),
        }
    }

    pub fn annotate(&mut self, frame: &RgbImage) -> RgbImage {
        let Self {
            known,
            provider,
            style,
            state,
        } = self;
        if let FrameOutcome::Failed(reason) = state.step(|| match_frame(frame, known, provider.as_mut())) {
            tracing::warn!(%reason, "recognition failed on this frame");
        }
        render_or_passthrough(frame, state.results(), style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceaccess_core::{DetectedFace, Encoding, FaceLocation, ProviderError};
    use faceaccess_hw::{Frame, SourceError};
    use image::Rgb;
    use std::cell::Cell;
    use std::rc::Rc;

    /// One face covering the centre of every frame, encoded as `[1.0, 0.0]`.
    struct CentreFace {
        calls: Rc<Cell<usize>>,
        fail: bool,
    }

    impl CentreFace {
        fn new(fail: bool) -> (Self, Rc<Cell<usize>>) {
            let calls = Rc::new(Cell::new(0));
            (Self { calls: Rc::clone(&calls), fail }, calls)
        }
    }

    impl EncodingProvider for CentreFace {
        fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(ProviderError::Unavailable("offline".into()));
            }
            let (w, h) = (image.width() as i32, image.height() as i32);
            Ok(vec![DetectedFace {
                location: FaceLocation::new(h / 4, w - w / 4, h - h / 4, w / 4),
                encoding: Encoding::new(vec![1.0, 0.0]),
            }])
        }
    }

    struct Frames(Vec<RgbImage>);

    impl FrameSource for Frames {
        fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            Ok((!self.0.is_empty()).then(|| Frame::new(self.0.remove(0), 0)))
        }
    }

    fn grey() -> RgbImage {
        RgbImage::from_pixel(64, 48, Rgb([40, 40, 40]))
    }

    #[test]
    fn test_recognizes_every_other_frame() {
        let mut known = KnownFaces::new();
        known.push("alice", Encoding::new(vec![1.0, 0.0]));
        let (provider, calls) = CentreFace::new(false);
        let mut session = Recognition::new(known, Box::new(provider), OverlayStyle::default());

        let frame = grey();
        for n in 1..=4 {
            let shown = session.annotate(&frame);
            assert_eq!(shown.dimensions(), frame.dimensions());
            assert_ne!(shown, frame, "overlay should be drawn on reused frames too");
            assert_eq!(calls.get(), (n + 1) / 2);
        }
        assert_eq!(calls.get(), 2);
        assert_eq!(session.state.results().len(), 1);
        assert!(session.state.results()[0].label.is_known());
    }

    #[test]
    fn test_failed_recognition_passes_frame_through() {
        let (provider, calls) = CentreFace::new(true);
        let mut session = Recognition::new(KnownFaces::new(), Box::new(provider), OverlayStyle::default());
        let frame = grey();
        assert_eq!(session.annotate(&frame), frame);
        assert_eq!(session.annotate(&frame), frame);
        assert_eq!(calls.get(), 1);
        assert!(session.state.results().is_empty());
    }

    #[test]
    fn test_empty_source_ends_without_window() {
        let mut source = Frames(Vec::new());
        let end = run_display(&mut source, "test", None, |f| f.clone()).unwrap();
        assert_eq!(end, LoopEnd::EndOfStream);
        assert!(capture_on_keypress(&mut source, "test").unwrap().is_none());
    }
}
