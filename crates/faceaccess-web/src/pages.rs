//! Server-rendered HTML for the landing and confirmation pages.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

const PREVIEW_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// One-line status message shown above the page body.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, text: text.into() }
    }
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// JPEG-encode a frame for an inline `data:` URL.
pub fn jpeg_base64(image: &RgbImage) -> Result<String, image::ImageError> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, PREVIEW_JPEG_QUALITY).encode_image(image)?;
    Ok(STANDARD.encode(jpeg))
}

fn layout(title: &str, notice: Option<&Notice>, body: &str) -> String {
    let notice_html = notice
        .map(|n| {
            let class = match n.kind {
                NoticeKind::Success => "notice success",
                NoticeKind::Error => "notice error",
            };
            format!("<p class=\"{class}\">{}</p>\n", escape(&n.text))
        })
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>\n\
         body {{ font-family: sans-serif; max-width: 40rem; margin: 2rem auto; }}\n\
         .notice {{ padding: .5rem 1rem; border-radius: 4px; }}\n\
         .success {{ background: #e3f6e3; color: #165c16; }}\n\
         .error {{ background: #fbe4e4; color: #8a1616; }}\n\
         img {{ max-width: 100%; }}\n\
         </style>\n</head>\n<body>\n<h1>{title}</h1>\n{notice_html}{body}</body>\n</html>\n",
        title = escape(title),
    )
}

pub fn landing(notice: Option<&Notice>) -> String {
    layout(
        "Face Access",
        notice,
        "<ul>\n\
         <li><a href=\"/register\">Register a new user</a></li>\n\
         <li><a href=\"/login\">Log in with facial recognition</a></li>\n\
         </ul>\n",
    )
}

/// Preview of a captured snapshot with the username form.
pub fn confirm(snapshot_id: &str, jpeg_b64: &str, notice: Option<&Notice>) -> String {
    let body = format!(
        "<img src=\"data:image/jpeg;base64,{jpeg_b64}\" alt=\"Captured snapshot\">\n\
         <form method=\"post\" action=\"/register\">\n\
         <input type=\"hidden\" name=\"snapshot_id\" value=\"{id}\">\n\
         <label>Username <input type=\"text\" name=\"username\" autofocus></label>\n\
         <button type=\"submit\">Register</button>\n\
         </form>\n\
         <p><a href=\"/register\">Retake</a> · <a href=\"/\">Cancel</a></p>\n",
        id = escape(snapshot_id),
    );
    layout("Confirm registration", notice, &body)
}
