//! Known-face registry: one image per identity on disk, parallel
//! (encoding, name) sequences in memory.

use crate::provider::{EncodingProvider, ProviderError};
use crate::types::Encoding;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const REGISTRATION_JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("encoding provider: {0}")]
    Provider(#[from] ProviderError),
    #[error("invalid username: use letters, digits, '-' or '_'")]
    InvalidName,
}

/// In-memory registry of reference encodings and their identity names.
///
/// The two sequences always have equal length: entries are only ever added
/// as a pair.
#[derive(Debug, Clone, Default)]
pub struct KnownFaces {
    encodings: Vec<Encoding>,
    names: Vec<String>,
}

impl KnownFaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every `.jpg`/`.jpeg`/`.png` file in `directory`.
    ///
    /// A missing directory yields an empty registry. Images with no detectable
    /// face, or that fail to decode, are skipped. Only the first face of a
    /// multi-face image is kept.
    pub fn load(directory: &Path, provider: &mut dyn EncodingProvider) -> Result<Self, RegistryError> {
        let mut known = Self::new();
        if !directory.is_dir() {
            tracing::info!(dir = %directory.display(), "known faces directory missing; registry empty");
            return Ok(known);
        }

        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if !path.is_file() || !has_image_extension(&path) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let image = match image::open(&path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable image");
                    continue;
                }
            };

            let faces = provider.detect_faces(&image)?;
            if faces.len() > 1 {
                tracing::warn!(
                    path = %path.display(),
                    faces = faces.len(),
                    "multiple faces in registration image; using the first"
                );
            }
            let Some(face) = faces.into_iter().next() else {
                tracing::debug!(path = %path.display(), "no face found; skipping");
                continue;
            };

            known.push(name, face.encoding);
        }

        tracing::info!(dir = %directory.display(), count = known.len(), "known faces loaded");
        Ok(known)
    }

    /// Append one identity. Duplicated names are kept side by side.
    pub fn push(&mut self, name: impl Into<String>, encoding: Encoding) {
        self.encodings.push(encoding);
        self.names.push(name.into());
    }

    pub fn encodings(&self) -> &[Encoding] {
        &self.encodings
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
}

/// Identity names stored in `directory`, sorted, without decoding any image.
pub fn registered_names(directory: &Path) -> Result<Vec<String>, RegistryError> {
    if !directory.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Reduce a username to `[a-z0-9_-]+`, or `None` if nothing survives.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!name.is_empty()).then_some(name)
}

/// Path of the stored registration image for an already sanitized name.
pub fn identity_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{name}.jpg"))
}

/// Save `image` as the reference photo for `username`, replacing any
/// earlier photo stored under the same sanitized name.
///
/// Returns the sanitized name. Nothing is written when the name is invalid.
pub fn register_identity(directory: &Path, username: &str, image: &RgbImage) -> Result<String, RegistryError> {
    let name = sanitize_name(username).ok_or(RegistryError::InvalidName)?;
    fs::create_dir_all(directory)?;

    let path = identity_path(directory, &name);
    let mut writer = BufWriter::new(File::create(&path)?);
    JpegEncoder::new_with_quality(&mut writer, REGISTRATION_JPEG_QUALITY).encode_image(image)?;

    tracing::info!(name = %name, path = %path.display(), "identity registered");
    Ok(name)
}
