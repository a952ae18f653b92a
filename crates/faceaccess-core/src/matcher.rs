//! Per-frame face matching against the known-face registry.

use crate::provider::{compare_faces, face_distance, EncodingProvider, ProviderError};
use crate::registry::KnownFaces;
use crate::types::{Encoding, FaceMatch, Label};
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Frames are shrunk by this divisor in both axes before detection, and
/// detected boxes are multiplied by it on the way out.
pub const DOWNSCALE_DIVISOR: u32 = 4;

/// Shrink a frame by [`DOWNSCALE_DIVISOR`], never below 1×1.
pub fn downscale(frame: &RgbImage) -> RgbImage {
    let width = (frame.width() / DOWNSCALE_DIVISOR).max(1);
    let height = (frame.height() / DOWNSCALE_DIVISOR).max(1);
    imageops::resize(frame, width, height, FilterType::Triangle)
}

/// Resolve one encoding to a registry name.
///
/// Takes the nearest known encoding and accepts it only if the tolerance
/// check also agrees at that index.
pub fn resolve_label(encoding: &Encoding, known: &KnownFaces, tolerance: f32) -> Label {
    let distances = face_distance(known.encodings(), encoding);
    let Some(best) = distances
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
    else {
        return Label::Unknown;
    };

    let matches = compare_faces(known.encodings(), encoding, tolerance);
    tracing::trace!(
        name = %known.names()[best],
        distance = distances[best],
        similarity = encoding.similarity(&known.encodings()[best]),
        "nearest known face"
    );
    if matches.get(best).copied().unwrap_or(false) {
        Label::Known(known.names()[best].clone())
    } else {
        Label::Unknown
    }
}

/// Find and label every face in `frame`.
///
/// Locations are returned in the coordinate space of the full-size frame.
/// A frame without faces yields an empty list.
pub fn match_frame(
    frame: &RgbImage,
    known: &KnownFaces,
    provider: &mut dyn EncodingProvider,
) -> Result<Vec<FaceMatch>, ProviderError> {
    let small = downscale(frame);
    let faces = provider.detect_faces(&small)?;
    let tolerance = provider.tolerance();

    Ok(faces
        .into_iter()
        .map(|face| FaceMatch {
            label: resolve_label(&face.encoding, known, tolerance),
            location: face.location.scaled(DOWNSCALE_DIVISOR as i32),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{encoding_of, ColorProvider};
    use crate::types::{DetectedFace, FaceLocation};
    use image::Rgb;

    /// Provider that reports fixed faces regardless of the image.
    struct FixedProvider {
        faces: Vec<DetectedFace>,
        seen: Option<(u32, u32)>,
    }

    impl EncodingProvider for FixedProvider {
        fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ProviderError> {
            self.seen = Some(image.dimensions());
            Ok(self.faces.clone())
        }

        fn tolerance(&self) -> f32 {
            0.6
        }
    }

    fn registry() -> KnownFaces {
        let mut known = KnownFaces::new();
        known.push("alice", encoding_of([200, 0, 0]));
        known.push("bob", encoding_of([0, 0, 200]));
        known
    }

    #[test]
    fn test_downscale_dimensions() {
        assert_eq!(downscale(&RgbImage::new(640, 480)).dimensions(), (160, 120));
        assert_eq!(downscale(&RgbImage::new(3, 2)).dimensions(), (1, 1));
    }

    #[test]
    fn test_locations_scale_back_by_four() {
        let mut provider = FixedProvider {
            faces: vec![DetectedFace {
                location: FaceLocation::new(10, 60, 50, 20),
                encoding: Encoding::new(vec![0.0; 3]),
            }],
            seen: None,
        };
        let frame = RgbImage::new(640, 480);
        let result = match_frame(&frame, &KnownFaces::new(), &mut provider).unwrap();
        assert_eq!(provider.seen, Some((160, 120)));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].location, FaceLocation::new(40, 240, 200, 80));
    }

    #[test]
    fn test_empty_registry_labels_unknown() {
        let frame = RgbImage::from_pixel(64, 64, Rgb([200, 0, 0]));
        let result = match_frame(&frame, &KnownFaces::new(), &mut ColorProvider::new()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].label, Label::Unknown);
    }

    #[test]
    fn test_no_faces_is_empty_not_error() {
        let frame = RgbImage::new(64, 64);
        let result = match_frame(&frame, &registry(), &mut ColorProvider::new()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_nearest_known_identity() {
        let mut frame = RgbImage::from_pixel(128, 64, Rgb([200, 0, 0]));
        for x in 64..128 {
            for y in 0..64 {
                frame.put_pixel(x, y, Rgb([0, 0, 200]));
            }
        }
        let result = match_frame(&frame, &registry(), &mut ColorProvider::new()).unwrap();
        let labels: Vec<String> = result.iter().map(|m| m.label.to_string()).collect();
        assert_eq!(labels, vec!["alice", "bob"]);
    }

    #[test]
    fn test_nearest_but_outside_tolerance_is_unknown() {
        let frame = RgbImage::from_pixel(64, 64, Rgb([0, 200, 0]));
        let result = match_frame(&frame, &registry(), &mut ColorProvider::new()).unwrap();
        assert_eq!(result[0].label, Label::Unknown);
    }

    #[test]
    fn test_provider_error_propagates() {
        let frame = RgbImage::new(64, 64);
        assert!(match_frame(&frame, &registry(), &mut ColorProvider::failing()).is_err());
    }

    #[test]
    fn test_resolve_label_picks_minimum_distance() {
        let mut known = KnownFaces::new();
        known.push("far", Encoding::new(vec![0.5]));
        known.push("near", Encoding::new(vec![0.1]));
        known.push("near", Encoding::new(vec![0.2]));
        assert_eq!(resolve_label(&Encoding::new(vec![0.0]), &known, 0.6), Label::Known("near".into()));
        assert_eq!(resolve_label(&Encoding::new(vec![0.0]), &known, 0.05), Label::Unknown);
    }
}
