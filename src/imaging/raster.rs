//! In-memory raster representation shared by every imaging operation.
//!
//! A [`RasterImage`] is an RGBA8 pixel buffer plus an alpha flag. The flag
//! records whether transparency is *meaningful* for the image: decoded JPEGs
//! are opaque, PNGs with an alpha channel are not, and some operations
//! ([`crop`](super::operations::crop) past the source edges, rotation without
//! a background) produce transparent pixels and therefore set the flag.
//! Opaque images always store alpha = 255, so the flag and the buffer never
//! disagree.

use image::{DynamicImage, Rgba, RgbaImage};
use serde::Serialize;

/// Decoded image: dimensions, RGBA8 pixels, and whether alpha is significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pixels: RgbaImage,
    has_alpha: bool,
}

impl RasterImage {
    /// Blank image. Transparent when `has_alpha`, opaque black otherwise.
    pub fn new(width: u32, height: u32, has_alpha: bool) -> Self {
        let fill = if has_alpha {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([0, 0, 0, 255])
        };
        Self {
            pixels: RgbaImage::from_pixel(width, height, fill),
            has_alpha,
        }
    }

    /// Wrap an RGBA buffer. Alpha is forced to 255 when `has_alpha` is false.
    pub fn from_pixels(mut pixels: RgbaImage, has_alpha: bool) -> Self {
        if !has_alpha {
            for p in pixels.pixels_mut() {
                p[3] = 255;
            }
        }
        Self { pixels, has_alpha }
    }

    pub fn from_fn<F>(width: u32, height: u32, has_alpha: bool, f: F) -> Self
    where
        F: FnMut(u32, u32) -> Rgba<u8>,
    {
        Self::from_pixels(RgbaImage::from_fn(width, height, f), has_alpha)
    }

    /// Convert from a decoded `image` crate value, keeping its alpha support.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        let has_alpha = img.color().has_alpha();
        Self::from_pixels(img.into_rgba8(), has_alpha)
    }

    /// Convert to a `DynamicImage` suitable for encoding. Opaque images are
    /// emitted as RGB8 so encoders without alpha support (JPEG) accept them.
    pub fn to_dynamic(&self) -> DynamicImage {
        let rgba = DynamicImage::ImageRgba8(self.pixels.clone());
        if self.has_alpha {
            rgba
        } else {
            DynamicImage::ImageRgb8(rgba.into_rgb8())
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    /// Approximate heap footprint of the pixel buffer, used by the memory
    /// cache's byte budget.
    pub fn byte_size(&self) -> usize {
        self.pixels.as_raw().len()
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}

/// Axis-aligned pixel rectangle, as reported by [`compare`](super::operations::compare).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        intersects_signed(
            (self.x as i64, self.y as i64, self.width as i64, self.height as i64),
            other,
        )
    }

    /// True when the rectangles overlap or share an edge or corner: `self`
    /// grown by one pixel on every side intersects `other`.
    pub fn touches(&self, other: &Rect) -> bool {
        intersects_signed(
            (
                self.x as i64 - 1,
                self.y as i64 - 1,
                self.width as i64 + 2,
                self.height as i64 + 2,
            ),
            other,
        )
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Clip to `width x height`; `None` when nothing remains.
    pub fn clip(&self, width: u32, height: u32) -> Option<Rect> {
        let right = self.right().min(width);
        let bottom = self.bottom().min(height);
        if self.x >= right || self.y >= bottom {
            return None;
        }
        Some(Rect::new(self.x, self.y, right - self.x, bottom - self.y))
    }
}

fn intersects_signed((x, y, w, h): (i64, i64, i64, i64), other: &Rect) -> bool {
    if w <= 0 || h <= 0 || other.is_empty() {
        return false;
    }
    let (ox, oy) = (other.x as i64, other.y as i64);
    let (ow, oh) = (other.width as i64, other.height as i64);
    x < ox + ow && ox < x + w && y < oy + oh && oy < y + h
}
