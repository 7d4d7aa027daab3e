//! Shared test utilities for the thumbcache test suite.
//!
//! Synthetic rasters and on-disk source images, so no test depends on
//! binary fixtures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let source = tmp.path().join("photo.png");
//! write_png(&source, 400, 300);
//!
//! let img = gradient(64, 48);
//! assert!(!img.has_alpha());
//! ```

use std::path::Path;
use std::time::{Duration, SystemTime};

use image::Rgba;

use crate::imaging::{ImageCodec, OutputFormat, RasterImage, RustCodec};

// =========================================================================
// Rasters
// =========================================================================

/// Opaque image whose pixels differ in every position, so crops, flips,
/// and rotations are observable.
pub fn gradient(width: u32, height: u32) -> RasterImage {
    RasterImage::from_fn(width, height, false, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

/// Single-color image.
pub fn solid(width: u32, height: u32, color: Rgba<u8>, has_alpha: bool) -> RasterImage {
    RasterImage::from_fn(width, height, has_alpha, |_, _| color)
}

// =========================================================================
// Files
// =========================================================================

/// Write a `width x height` gradient PNG to `path`.
pub fn write_png(path: &Path, width: u32, height: u32) {
    let bytes = RustCodec::default()
        .encode(&gradient(width, height), OutputFormat::Png)
        .unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Move a file's modification time `secs` seconds into the past, so
/// fingerprints and recency checks change without sleeping.
pub fn backdate(path: &Path, secs: u64) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    let then = SystemTime::now() - Duration::from_secs(secs);
    file.set_modified(then).unwrap();
}
