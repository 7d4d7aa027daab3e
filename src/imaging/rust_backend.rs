//! Pure Rust codec built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::load_from_memory` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the configured quality |

use super::backend::{BackendError, ImageCodec};
use super::params::{OutputFormat, Quality};
use super::raster::RasterImage;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has an extension this codec can decode (case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Codec backed by the `image` crate.
///
/// `quality` applies to JPEG output only; PNG is lossless.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCodec {
    quality: Quality,
}

impl RustCodec {
    pub fn new(quality: Quality) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}

impl ImageCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, BackendError> {
        let img = image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(RasterImage::from_dynamic(img))
    }

    fn encode(&self, image: &RasterImage, format: OutputFormat) -> Result<Vec<u8>, BackendError> {
        let encode_err = |e: image::ImageError| BackendError::Encode {
            format,
            message: e.to_string(),
        };
        let dynamic = image.to_dynamic();
        let mut out = Vec::new();
        match format {
            OutputFormat::Png => dynamic
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(encode_err)?,
            OutputFormat::Jpeg => {
                // JPEG has no alpha; flatten whatever is there.
                let rgb = image::DynamicImage::ImageRgb8(dynamic.into_rgb8());
                let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                    &mut out,
                    self.quality.value() as u8,
                );
                rgb.write_with_encoder(encoder).map_err(encode_err)?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient, solid, write_png};
    use image::Rgba;

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = super::supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn is_image_file_ignores_case_and_unknown_extensions() {
        assert!(is_image_file(Path::new("/photos/IMG_0001.JPG")));
        assert!(is_image_file(Path::new("scan.tiff")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("no_extension")));
    }

    #[test]
    fn png_preserves_pixels_and_alpha() {
        let codec = RustCodec::default();
        let img = solid(12, 7, Rgba([10, 20, 30, 128]), true);
        let bytes = codec.encode(&img, OutputFormat::Png).unwrap();
        let back = codec.decode(&bytes).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn opaque_png_decodes_without_alpha() {
        let codec = RustCodec::default();
        let img = gradient(16, 9);
        let back = codec
            .decode(&codec.encode(&img, OutputFormat::Png).unwrap())
            .unwrap();
        assert!(!back.has_alpha());
        assert_eq!(back.pixels(), img.pixels());
    }

    #[test]
    fn jpeg_output_is_opaque_and_sized() {
        let codec = RustCodec::new(Quality::new(80));
        let img = solid(40, 30, Rgba([200, 100, 50, 100]), true);
        let bytes = codec.encode(&img, OutputFormat::Jpeg).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let back = codec.decode(&bytes).unwrap();
        assert_eq!(back.dimensions(), (40, 30));
        assert!(!back.has_alpha());
    }

    #[test]
    fn decode_garbage_errors() {
        let codec = RustCodec::default();
        assert!(matches!(
            codec.decode(b"definitely not an image"),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn decode_file_reads_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.png");
        write_png(&path, 30, 20);
        let img = RustCodec::default().decode_file(&path).unwrap();
        assert_eq!(img.dimensions(), (30, 20));
    }
}
