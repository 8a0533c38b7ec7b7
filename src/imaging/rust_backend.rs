//! Pure Rust codec built on the `image` crate ecosystem.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Probe | `image::ImageReader::into_dimensions` (header only, no full decode) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → WebP | `webp` crate (libwebp, lossy with quality) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! [`ImageCodec::resize_encode_all`] decodes the source once and resizes every
//! target from that shared frame.
//!
//! AVIF uploads are not accepted: the `image` crate's `"avif"` feature only
//! enables the **encoder**. Probing an AVIF upload fails as unreadable.

use super::backend::{CodecError, Dimensions, ImageCodec};
use super::params::{EncodeParams, EncodeTarget};
use crate::types::OutputFormat;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use rayon::prelude::*;
use std::io::Cursor;
use std::sync::LazyLock;

/// rav1e speed preset; 6 trades a little size for reasonable throughput.
const AVIF_SPEED: u8 = 6;

/// Largest width or height libwebp will encode.
const WEBP_MAX_DIMENSION: u32 = 16383;

/// Extensions whose decoders are compiled in.
const INPUT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    INPUT_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of input file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Production codec. Stateless; one instance is shared across requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

fn decode_message(bytes: &[u8]) -> Result<DynamicImage, String> {
    image::load_from_memory(bytes).map_err(|e| format!("decode failed: {e}"))
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    decode_message(bytes).map_err(CodecError::Encode)
}

fn encode_webp(img: &DynamicImage, quality: u32) -> Result<Vec<u8>, CodecError> {
    if img.width() > WEBP_MAX_DIMENSION || img.height() > WEBP_MAX_DIMENSION {
        return Err(CodecError::Encode(format!(
            "{}x{} exceeds the WebP limit of {WEBP_MAX_DIMENSION}px per side",
            img.width(),
            img.height()
        )));
    }
    // libwebp only accepts 8-bit RGB(A) buffers.
    let normalized = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    let encoder = webp::Encoder::from_image(&normalized)
        .map_err(|e| CodecError::Encode(format!("WebP encoder rejected image: {e}")))?;
    let memory = encoder
        .encode_simple(false, quality as f32)
        .map_err(|e| CodecError::Encode(format!("WebP encode failed: {e:?}")))?;
    Ok(memory.to_vec())
}

fn encode_avif(img: &DynamicImage, quality: u32) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    let encoder =
        image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, quality as u8);
    img.write_with_encoder(encoder)
        .map_err(|e| CodecError::Encode(format!("AVIF encode failed: {e}")))?;
    Ok(buf)
}

/// Resize a decoded source to one target (never enlarging) and encode it.
fn render(img: &DynamicImage, target: &EncodeTarget) -> Result<Vec<u8>, CodecError> {
    let resized;
    let frame = if target.width < img.width() {
        resized = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
        &resized
    } else {
        img
    };
    match target.format {
        OutputFormat::Webp => encode_webp(frame, target.quality.value()),
        OutputFormat::Avif => encode_avif(frame, target.quality.value()),
    }
}

impl ImageCodec for RustCodec {
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions, CodecError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CodecError::Metadata(e.to_string()))?
            .into_dimensions()
            .map_err(|e| CodecError::Metadata(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(CodecError::Metadata(format!(
                "degenerate dimensions {width}x{height}"
            )));
        }
        Ok(Dimensions { width, height })
    }

    fn resize_encode(&self, params: &EncodeParams<'_>) -> Result<Vec<u8>, CodecError> {
        let target = EncodeTarget {
            width: params.width,
            height: params.height,
            format: params.format,
            quality: params.quality,
        };
        render(&decode(params.source)?, &target)
    }

    /// Decodes the source once and shares it across every target.
    fn resize_encode_all(
        &self,
        source: &[u8],
        targets: &[EncodeTarget],
    ) -> Vec<Result<Vec<u8>, CodecError>> {
        let img = match decode_message(source) {
            Ok(img) => img,
            Err(message) => {
                return targets
                    .iter()
                    .map(|_| Err(CodecError::Encode(message.clone())))
                    .collect();
            }
        };
        targets.par_iter().map(|target| render(&img, target)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Quality;
    use image::{ImageEncoder, RgbImage};

    /// Encode a small valid JPEG with the given dimensions.
    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut buf)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    fn encode(source: &[u8], width: u32, height: u32, format: OutputFormat) -> Vec<u8> {
        RustCodec::new()
            .resize_encode(&EncodeParams {
                source,
                width,
                height,
                format,
                quality: Quality::new(80),
            })
            .unwrap()
    }

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
        assert!(!exts.contains(&"avif"));
    }

    #[test]
    fn probe_synthetic_jpeg() {
        let dims = RustCodec::new().probe(&test_jpeg(200, 150)).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn probe_garbage_is_metadata_error() {
        let result = RustCodec::new().probe(b"definitely not an image");
        assert!(matches!(result, Err(CodecError::Metadata(_))));
    }

    #[test]
    fn resize_to_webp() {
        let bytes = encode(&test_jpeg(400, 300), 200, 150, OutputFormat::Webp);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 150));
    }

    #[test]
    fn resize_to_avif() {
        let bytes = encode(&test_jpeg(128, 96), 64, 48, OutputFormat::Avif);
        assert_eq!(&bytes[4..8], b"ftyp");
    }

    #[test]
    fn never_enlarges() {
        let bytes = encode(&test_jpeg(100, 80), 400, 320, OutputFormat::Webp);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 80));
    }

    #[test]
    fn encode_garbage_is_encode_error() {
        let result = RustCodec::new().resize_encode(&EncodeParams {
            source: b"garbage",
            width: 10,
            height: 10,
            format: OutputFormat::Webp,
            quality: Quality::new(80),
        });
        assert!(matches!(result, Err(CodecError::Encode(_))));
    }

    #[test]
    fn webp_beyond_libwebp_limit_is_encode_error() {
        let tall = test_jpeg(64, 17000);
        let result = RustCodec::new().resize_encode(&EncodeParams {
            source: &tall,
            width: 64,
            height: 17000,
            format: OutputFormat::Webp,
            quality: Quality::new(80),
        });
        assert!(matches!(result, Err(CodecError::Encode(msg)) if msg.contains("16383")));
    }

    #[test]
    fn encode_all_keeps_target_order() {
        let source = test_jpeg(200, 100);
        let targets = [
            EncodeTarget { width: 50, height: 25, format: OutputFormat::Webp, quality: Quality::new(80) },
            EncodeTarget { width: 50, height: 25, format: OutputFormat::Avif, quality: Quality::new(55) },
            EncodeTarget { width: 100, height: 50, format: OutputFormat::Webp, quality: Quality::new(80) },
        ];
        let results = RustCodec::new().resize_encode_all(&source, &targets);
        assert_eq!(results.len(), 3);

        let first = results[0].as_ref().unwrap();
        assert_eq!(&first[8..12], b"WEBP");
        assert_eq!(image::load_from_memory(first).unwrap().width(), 50);
        assert_eq!(&results[1].as_ref().unwrap()[4..8], b"ftyp");
        let third = results[2].as_ref().unwrap();
        assert_eq!(image::load_from_memory(third).unwrap().width(), 100);
    }

    #[test]
    fn encode_all_undecodable_fails_every_target() {
        let targets = [
            EncodeTarget { width: 10, height: 10, format: OutputFormat::Webp, quality: Quality::new(80) },
            EncodeTarget { width: 20, height: 20, format: OutputFormat::Webp, quality: Quality::new(80) },
        ];
        let results = RustCodec::new().resize_encode_all(b"garbage", &targets);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, Err(CodecError::Encode(_)))));
    }
}
