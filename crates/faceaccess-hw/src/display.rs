//! Preview window for live and recorded frames (minifb).

use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("cannot open window: {0}")]
    Open(String),
    #[error("cannot draw frame: {0}")]
    Update(String),
}

/// What the user asked for since the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    None,
    /// `q`, Escape, or the window was closed.
    Quit,
    /// Space or Enter.
    Capture,
}

pub struct PreviewWindow {
    window: Window,
    buffer: Vec<u32>,
}

impl PreviewWindow {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, DisplayError> {
        let mut window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| DisplayError::Open(e.to_string()))?;
        window.set_target_fps(60);
        tracing::debug!(title, width, height, "preview window opened");
        Ok(Self {
            window,
            buffer: Vec::new(),
        })
    }

    pub fn show(&mut self, image: &RgbImage) -> Result<(), DisplayError> {
        pack_0rgb(image, &mut self.buffer);
        self.window
            .update_with_buffer(&self.buffer, image.width() as usize, image.height() as usize)
            .map_err(|e| DisplayError::Update(e.to_string()))
    }

    /// Poll keyboard state. Call after [`show`](Self::show).
    pub fn poll(&self) -> WindowEvent {
        if !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_down(Key::Q)
        {
            WindowEvent::Quit
        } else if self.window.is_key_pressed(Key::Space, KeyRepeat::No)
            || self.window.is_key_pressed(Key::Enter, KeyRepeat::No)
        {
            WindowEvent::Capture
        } else {
            WindowEvent::None
        }
    }
}

/// Pack RGB pixels as minifb's `0x00RRGGBB` words, reusing `out`.
pub fn pack_0rgb(image: &RgbImage, out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        image
            .pixels()
            .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
    );
}
