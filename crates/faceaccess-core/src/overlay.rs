//! Bounding-box and name-label overlay for display frames.

use crate::types::{FaceLocation, FaceMatch};
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use thiserror::Error;

const LABEL_STRIP_HEIGHT: i32 = 35;
const LABEL_TEXT_INSET: i32 = 6;
const LABEL_TEXT_SCALE: f32 = 24.0;
/// Text starting further left or above than this is off-frame for any label.
const TEXT_ORIGIN_LIMIT: i64 = 4096;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("malformed face box: {0:?}")]
    MalformedBox(FaceLocation),
    #[error("font {path}: {reason}")]
    Font { path: String, reason: String },
}

/// Colours and font used to draw matches.
#[derive(Clone)]
pub struct OverlayStyle {
    pub known: Rgb<u8>,
    pub unknown: Rgb<u8>,
    pub text: Rgb<u8>,
    /// Labels are drawn as empty strips when no font is available.
    pub font: Option<FontArc>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            known: Rgb([0, 150, 0]),
            unknown: Rgb([255, 0, 0]),
            text: Rgb([255, 255, 255]),
            font: None,
        }
    }
}

impl OverlayStyle {
    /// Default colours with label text rendered in the given TTF/OTF font.
    pub fn with_font_file(path: &Path) -> Result<Self, OverlayError> {
        let font_error = |reason: String| OverlayError::Font {
            path: path.display().to_string(),
            reason,
        };
        let bytes = std::fs::read(path).map_err(|e| font_error(e.to_string()))?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| font_error(e.to_string()))?;
        Ok(Self { font: Some(font), ..Self::default() })
    }
}

/// Draw every match onto a copy of `frame`.
///
/// The returned image has the same dimensions as the input. Boxes partly
/// outside the frame are clipped; a box with no area is an error.
pub fn render(frame: &RgbImage, matches: &[FaceMatch], style: &OverlayStyle) -> Result<RgbImage, OverlayError> {
    let mut canvas = frame.clone();
    for m in matches {
        draw_match(&mut canvas, m, style)?;
    }
    Ok(canvas)
}

/// [`render`], falling back to the untouched frame on any failure.
pub fn render_or_passthrough(frame: &RgbImage, matches: &[FaceMatch], style: &OverlayStyle) -> RgbImage {
    match render(frame, matches, style) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!(error = %e, "overlay skipped");
            frame.clone()
        }
    }
}

fn draw_match(canvas: &mut RgbImage, m: &FaceMatch, style: &OverlayStyle) -> Result<(), OverlayError> {
    let loc = m.location;
    if !loc.is_well_formed() {
        return Err(OverlayError::MalformedBox(loc));
    }
    let colour = if m.label.is_known() { style.known } else { style.unknown };
    let (left, top) = (i64::from(loc.left), i64::from(loc.top));
    let (right, bottom) = (i64::from(loc.right), i64::from(loc.bottom));

    // Two nested outlines give a 2-px border.
    if let Some(outer) = clip_rect(canvas, left, top, right, bottom) {
        draw_hollow_rect_mut(canvas, outer, colour);
    }
    if let Some(inner) = clip_rect(canvas, left + 1, top + 1, right - 1, bottom - 1) {
        draw_hollow_rect_mut(canvas, inner, colour);
    }

    let strip_top = bottom - i64::from(LABEL_STRIP_HEIGHT);
    let Some(strip) = clip_rect(canvas, left, strip_top, right, bottom) else {
        return Ok(());
    };
    draw_filled_rect_mut(canvas, strip, colour);

    if let Some(font) = &style.font {
        let inset = i64::from(LABEL_TEXT_INSET);
        let x = (left + inset).clamp(-TEXT_ORIGIN_LIMIT, i64::from(canvas.width()));
        let y = (strip_top + inset).clamp(-TEXT_ORIGIN_LIMIT, i64::from(canvas.height()));
        draw_text_mut(
            canvas,
            style.text,
            x as i32,
            y as i32,
            PxScale::from(LABEL_TEXT_SCALE),
            font,
            m.label.as_str(),
        );
    }
    Ok(())
}

/// Clamp a half-open box to one pixel beyond each canvas edge. Edges that
/// fall outside the frame stay invisible and the result always fits a
/// [`Rect`]. `None` when nothing of the box remains.
fn clip_rect(canvas: &RgbImage, left: i64, top: i64, right: i64, bottom: i64) -> Option<Rect> {
    let (w, h) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let (l, r) = (left.clamp(-1, w + 1), right.clamp(-1, w + 1));
    let (t, b) = (top.clamp(-1, h + 1), bottom.clamp(-1, h + 1));
    (r > l && b > t).then(|| Rect::at(l as i32, t as i32).of_size((r - l) as u32, (b - t) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;

    fn frame() -> RgbImage {
        RgbImage::from_pixel(200, 200, Rgb([10, 10, 10]))
    }

    fn at(loc: FaceLocation, label: Label) -> FaceMatch {
        FaceMatch { location: loc, label }
    }

    #[test]
    fn test_no_matches_is_identity() {
        let src = frame();
        let out = render(&src, &[], &OverlayStyle::default()).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_known_and_unknown_colours() {
        let style = OverlayStyle::default();
        let matches = [
            at(FaceLocation::new(10, 90, 90, 10), Label::Known("alice".into())),
            at(FaceLocation::new(100, 190, 190, 110), Label::Unknown),
        ];
        let out = render(&frame(), &matches, &style).unwrap();
        assert_eq!(out.dimensions(), (200, 200));
        // top-left corner of each border
        assert_eq!(out.get_pixel(10, 10), &style.known);
        assert_eq!(out.get_pixel(110, 100), &style.unknown);
        // label strip is filled right above the bottom edge
        assert_eq!(out.get_pixel(50, 80), &style.known);
        // box interior above the strip is untouched
        assert_eq!(out.get_pixel(50, 30), &Rgb([10, 10, 10]));
    }

    #[test]
    fn test_box_partly_outside_is_clipped() {
        let matches = [at(FaceLocation::new(150, 260, 260, 150), Label::Unknown)];
        let out = render(&frame(), &matches, &OverlayStyle::default()).unwrap();
        assert_eq!(out.dimensions(), (200, 200));
        assert_eq!(out.get_pixel(150, 150), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_malformed_box_passthrough() {
        let src = frame();
        let matches = [
            at(FaceLocation::new(10, 90, 90, 10), Label::Unknown),
            at(FaceLocation::new(50, 20, 40, 30), Label::Unknown),
        ];
        assert!(matches!(
            render(&src, &matches, &OverlayStyle::default()),
            Err(OverlayError::MalformedBox(_))
        ));
        assert_eq!(render_or_passthrough(&src, &matches, &OverlayStyle::default()), src);
    }

    #[test]
    fn test_extreme_box_does_not_panic() {
        let src = RgbImage::from_pixel(50, 50, Rgb([10, 10, 10]));
        let matches = [at(FaceLocation::new(0, i32::MAX, 10, -10), Label::Unknown)];
        let out = render_or_passthrough(&src, &matches, &OverlayStyle::default());
        assert_eq!(out.dimensions(), (50, 50));
        // the visible part of the top border is drawn
        assert_eq!(out.get_pixel(0, 0), &Rgb([255, 0, 0]));

        let far = [at(FaceLocation::new(i32::MIN, i32::MAX, i32::MAX, i32::MIN), Label::Unknown)];
        assert_eq!(render(&src, &far, &OverlayStyle::default()).unwrap().dimensions(), (50, 50));

        let offscreen = [at(FaceLocation::new(i32::MAX - 20, i32::MAX, i32::MAX, i32::MAX - 20), Label::Unknown)];
        assert_eq!(render(&src, &offscreen, &OverlayStyle::default()).unwrap(), src);
    }

    #[test]
    fn test_missing_font_file() {
        let result = OverlayStyle::with_font_file(Path::new("/definitely/not/a/font.ttf"));
        assert!(matches!(result, Err(OverlayError::Font { .. })));
    }
}
