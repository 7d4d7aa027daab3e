//! Parameter types for image operations.
//!
//! These describe *what* to produce, not *how*: the [`operations`](super::operations)
//! module does the pixel work and the [`backend`](super::backend) does the
//! encoding. Keeping them as plain data lets cache keys and config files
//! refer to them without pulling in any pixel code.
//!
//! ## Types
//!
//! - [`ResizeMode`]: FIT (whole image inside the box) or FILL (box covered, overflow cropped).
//! - [`OutputFormat`]: Encoding used for persisted cache entries (PNG or JPEG).
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`ShadowParams`]: Drop-shadow geometry for [`add_shadow`](super::operations::add_shadow).

use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a source image is mapped onto a target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Preserve aspect ratio; result fits inside the box and may be smaller
    /// than it in one dimension.
    Fit,
    /// Preserve aspect ratio; result covers the box and the overflow is
    /// center-cropped, so the output is exactly the box.
    #[default]
    Fill,
}

impl ResizeMode {
    /// Marker used as a cache key component.
    pub fn marker(self) -> &'static str {
        match self {
            ResizeMode::Fit => "fit",
            ResizeMode::Fill => "fill",
        }
    }
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

impl FromStr for ResizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fit" => Ok(ResizeMode::Fit),
            "fill" => Ok(ResizeMode::Fill),
            other => Err(format!("unknown resize mode '{other}' (expected fit or fill)")),
        }
    }
}

/// Encoding of persisted cache entries. Fixed per store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(format!("unknown output format '{other}' (expected png or jpeg)")),
        }
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Drop-shadow geometry.
///
/// - `angle`: direction of the offset in degrees (0 = right, 90 = down)
/// - `distance`: offset length in pixels
/// - `size`: blur kernel size, also the transparent margin added around the image
/// - `opacity`: shadow opacity, 0.0–1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowParams {
    pub angle: f64,
    pub distance: u32,
    pub size: u32,
    pub opacity: f32,
    pub color: Rgba<u8>,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self {
            angle: 30.0,
            distance: 3,
            size: 3,
            opacity: 0.5,
            color: Rgba([0, 0, 0, 255]),
        }
    }
}

impl ShadowParams {
    pub fn with_color(color: Rgba<u8>) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }
}
