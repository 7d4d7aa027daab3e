//! Pixel operations on [`RasterImage`].
//!
//! Every function here is pure: it reads its input and returns a new image
//! (the one exception is [`fill`], which paints in place). Dimension math is
//! delegated to [`calculations`](super::calculations) so the interesting
//! numbers stay unit-testable without pixels.
//!
//! ## Progressive resampling
//!
//! A single bilinear pass across a large scale factor samples only a few
//! source pixels per output pixel and aliases badly. [`resize_to`] instead
//! walks a chain of 0.5x (or 1.5x) bilinear steps and snaps the final step
//! to the exact target, so no single pass ever scales by more than 2x.

use super::calculations::{
    self, center_offset, partition, quarter_turns, resize_steps, rotated_bounds, shadow_offset,
};
use super::params::{ResizeMode, ShadowParams};
use super::raster::{RasterImage, Rect};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::borrow::Cow;
use thiserror::Error;

/// Luminance weights for sRGB channel values.
const LUMA_RED: f64 = 0.2126;
const LUMA_GREEN: f64 = 0.7152;
const LUMA_BLUE: f64 = 0.0722;

/// Approximate block edge used by [`compare`].
pub const COMPARE_BLOCK_SIZE: u32 = 10;
/// Minimum per-block brightness difference reported as a change.
pub const COMPARE_THRESHOLD: f64 = 20.0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RasterError {
    #[error("Image dimensions differ: {left:?} vs {right:?}")]
    DimensionMismatch {
        left: (u32, u32),
        right: (u32, u32),
    },
}

// ============================================================================
// Resize
// ============================================================================

/// Resize `image` into a `width x height` box.
///
/// Returns the input unchanged (borrowed, no work done) when it already has
/// the requested size. Otherwise resamples progressively to the size given by
/// [`calculate_size`]; in [`ResizeMode::Fill`] the result is then
/// center-cropped to exactly `width x height`.
pub fn resize_to(
    mode: ResizeMode,
    image: &RasterImage,
    width: u32,
    height: u32,
) -> Cow<'_, RasterImage> {
    if image.dimensions() == (width, height) {
        return Cow::Borrowed(image);
    }

    let target = calculate_size(mode, image, width, height);

    let mut current: Option<RgbaImage> = None;
    for (step_w, step_h) in resize_steps(image.dimensions(), target) {
        let source = current.as_ref().unwrap_or(image.pixels());
        let next = imageops::resize(source, step_w, step_h, FilterType::Triangle);
        current = Some(next);
    }
    let resized = match current {
        Some(pixels) => RasterImage::from_pixels(pixels, image.has_alpha()),
        None => image.clone(),
    };

    match mode {
        ResizeMode::Fill if resized.dimensions() != (width, height) => {
            Cow::Owned(crop_center(&resized, width, height))
        }
        _ => Cow::Owned(resized),
    }
}

pub fn resize_to_fit(image: &RasterImage, width: u32, height: u32) -> Cow<'_, RasterImage> {
    resize_to(ResizeMode::Fit, image, width, height)
}

pub fn resize_to_fill(image: &RasterImage, width: u32, height: u32) -> Cow<'_, RasterImage> {
    resize_to(ResizeMode::Fill, image, width, height)
}

/// Aspect-preserving size of `image` resized into `width x height`.
pub fn calculate_size(mode: ResizeMode, image: &RasterImage, width: u32, height: u32) -> (u32, u32) {
    calculations::calculate_size(mode, image.dimensions(), (width, height))
}

// ============================================================================
// Crop / copy / fill
// ============================================================================

/// Extract the `width x height` rectangle at `(x, y)`.
///
/// Any part of the rectangle outside the source is transparent, and in that
/// case the result has an alpha channel even if the source did not.
pub fn crop(image: &RasterImage, x: i64, y: i64, width: u32, height: u32) -> RasterImage {
    let (src_w, src_h) = image.dimensions();
    let out_of_bounds =
        x < 0 || y < 0 || x + width as i64 > src_w as i64 || y + height as i64 > src_h as i64;
    let has_alpha = out_of_bounds || image.has_alpha();

    let mut pixels = RgbaImage::new(width, height);
    imageops::replace(&mut pixels, image.pixels(), -x, -y);
    RasterImage::from_pixels(pixels, has_alpha)
}

/// Crop a centered `width x height` rectangle.
pub fn crop_center(image: &RasterImage, width: u32, height: u32) -> RasterImage {
    let (x, y) = center_offset(image.dimensions(), (width, height));
    crop(image, x, y, width, height)
}

/// Copy with a chosen alpha flag. Dropping alpha flattens onto black.
pub fn copy(image: &RasterImage, has_alpha: bool) -> RasterImage {
    if has_alpha || !image.has_alpha() {
        return RasterImage::from_pixels(image.pixels().clone(), has_alpha);
    }
    let black = Rgba([0, 0, 0, 255]);
    let pixels = RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        over(*image.pixels().get_pixel(x, y), black)
    });
    RasterImage::from_pixels(pixels, false)
}

/// Paint every pixel of `image` with `color`, in place.
pub fn fill(image: &mut RasterImage, color: Rgba<u8>) {
    let color = if image.has_alpha() {
        color
    } else {
        Rgba([color[0], color[1], color[2], 255])
    };
    for p in image.pixels_mut().pixels_mut() {
        *p = color;
    }
}

pub fn has_alpha(image: &RasterImage) -> bool {
    image.has_alpha()
}

// ============================================================================
// Rotate / flip
// ============================================================================

/// Rotate clockwise by `degrees` about the image center.
///
/// The canvas grows to the rotated bounding box. Uncovered area is filled
/// with `background` when given (the result is then opaque), otherwise left
/// transparent. Multiples of 90 degrees are exact pixel permutations; other
/// angles are sampled bilinearly.
pub fn rotate(image: &RasterImage, degrees: f64, background: Option<Rgba<u8>>) -> RasterImage {
    let has_alpha = background.is_none();

    if let Some(turns) = quarter_turns(degrees) {
        let rotated = match turns {
            1 => imageops::rotate90(image.pixels()),
            2 => imageops::rotate180(image.pixels()),
            3 => imageops::rotate270(image.pixels()),
            _ => image.pixels().clone(),
        };
        return match background {
            Some(bg) => RasterImage::from_pixels(flatten(rotated, bg), false),
            None => RasterImage::from_pixels(rotated, has_alpha),
        };
    }

    let (src_w, src_h) = image.dimensions();
    let (dst_w, dst_h) = rotated_bounds(src_w, src_h, degrees);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (src_cx, src_cy) = (src_w as f64 / 2.0, src_h as f64 / 2.0);
    let (dst_cx, dst_cy) = (dst_w as f64 / 2.0, dst_h as f64 / 2.0);
    let outside = background.map(premultiply).unwrap_or([0.0; 4]);

    let pixels = RgbaImage::from_fn(dst_w, dst_h, |x, y| {
        let dx = x as f64 + 0.5 - dst_cx;
        let dy = y as f64 + 0.5 - dst_cy;
        // Inverse rotation maps the destination pixel center back into the source.
        let sx = cos * dx + sin * dy + src_cx - 0.5;
        let sy = -sin * dx + cos * dy + src_cy - 0.5;
        let sample = unpremultiply(sample_bilinear(image.pixels(), sx, sy, outside));
        match background {
            Some(bg) => over(sample, bg),
            None => sample,
        }
    });

    RasterImage::from_pixels(pixels, has_alpha)
}

/// Mirror left-to-right.
pub fn flip_horizontally(image: &RasterImage) -> RasterImage {
    RasterImage::from_pixels(imageops::flip_horizontal(image.pixels()), image.has_alpha())
}

/// Mirror top-to-bottom.
pub fn flip_vertically(image: &RasterImage) -> RasterImage {
    RasterImage::from_pixels(imageops::flip_vertical(image.pixels()), image.has_alpha())
}

/// Undo an EXIF orientation tag (1–8). Unknown values return a copy.
pub fn apply_orientation(image: &RasterImage, orientation: u16) -> RasterImage {
    match orientation {
        2 => flip_horizontally(image),
        3 => rotate_keeping_alpha(image, 180.0),
        4 => flip_vertically(image),
        5 => flip_horizontally(&rotate_keeping_alpha(image, 90.0)),
        6 => rotate_keeping_alpha(image, 90.0),
        7 => flip_horizontally(&rotate_keeping_alpha(image, 270.0)),
        8 => rotate_keeping_alpha(image, 270.0),
        _ => image.clone(),
    }
}

fn rotate_keeping_alpha(image: &RasterImage, degrees: f64) -> RasterImage {
    let rotated = rotate(image, degrees, None);
    RasterImage::from_pixels(rotated.into_pixels(), image.has_alpha())
}

// ============================================================================
// Border / shadow
// ============================================================================

/// Surround `image` with a `thickness`-pixel frame of `color`, or a
/// transparent frame when `color` is `None`.
pub fn add_border(image: &RasterImage, color: Option<Rgba<u8>>, thickness: u32) -> RasterImage {
    let has_alpha = color.is_none() || image.has_alpha();
    let width = image.width() + 2 * thickness;
    let height = image.height() + 2 * thickness;

    let mut pixels = RgbaImage::from_pixel(width, height, color.unwrap_or(Rgba([0, 0, 0, 0])));
    imageops::replace(
        &mut pixels,
        image.pixels(),
        thickness as i64,
        thickness as i64,
    );
    RasterImage::from_pixels(pixels, has_alpha)
}

/// Composite `image` over a blurred, offset silhouette of itself.
///
/// The silhouette is the image's alpha mask (padded by `params.size`)
/// tinted with `params.color` at `params.opacity`, box-blurred with a
/// `size x size` kernel, and displaced along `params.angle` by
/// `params.distance`. The canvas grows to hold both.
///
/// The offset is measured from the image itself: the shadow's padded mask
/// sits `(dx, dy)` from the padded image, not from the unpadded one.
pub fn add_shadow(image: &RasterImage, params: &ShadowParams) -> RasterImage {
    let (dx, dy) = shadow_offset(params.angle, params.distance);
    let padded = add_border(image, None, params.size);
    let (pw, ph) = padded.dimensions();

    let mask: Vec<f32> = padded
        .pixels()
        .pixels()
        .map(|p| p[3] as f32 * params.opacity)
        .collect();
    let blurred = box_blur(&mask, pw, ph, params.size.max(1));

    let [r, g, b, _] = params.color.0;
    let shadow = RgbaImage::from_fn(pw, ph, |x, y| {
        let a = blurred[(y * pw + x) as usize].round().clamp(0.0, 255.0) as u8;
        Rgba([r, g, b, a])
    });

    let width = pw + dx.unsigned_abs() as u32;
    let height = ph + dy.unsigned_abs() as u32;
    let mut canvas = RgbaImage::new(width, height);
    imageops::replace(&mut canvas, &shadow, dx.max(0), dy.max(0));
    imageops::overlay(&mut canvas, padded.pixels(), (-dx).max(0), (-dy).max(0));

    RasterImage::from_pixels(canvas, true)
}

/// Separable box blur with zero padding. The kernel origin sits at
/// `(size - 1) / 2`.
fn box_blur(values: &[f32], width: u32, height: u32, size: u32) -> Vec<f32> {
    let (w, h) = (width as i64, height as i64);
    let k = size as i64;
    let origin = (k - 1) / 2;
    let norm = k as f32;

    let mut horizontal = vec![0.0f32; values.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            for i in 0..k {
                let sx = x - origin + i;
                if (0..w).contains(&sx) {
                    sum += values[(y * w + sx) as usize];
                }
            }
            horizontal[(y * w + x) as usize] = sum / norm;
        }
    }

    let mut out = vec![0.0f32; values.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            for i in 0..k {
                let sy = y - origin + i;
                if (0..h).contains(&sy) {
                    sum += horizontal[(sy * w + x) as usize];
                }
            }
            out[(y * w + x) as usize] = sum / norm;
        }
    }
    out
}

// ============================================================================
// Brightness / comparison
// ============================================================================

/// Mean perceptual brightness (0–255) of `image`, or of `region` within it.
///
/// The region is clipped to the image; an empty region yields 0.
pub fn average_brightness(image: &RasterImage, region: Option<Rect>) -> f64 {
    let full = Rect::new(0, 0, image.width(), image.height());
    let Some(area) = region.unwrap_or(full).clip(image.width(), image.height()) else {
        return 0.0;
    };

    let mut sum = 0.0;
    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            sum += luminance(image.pixels().get_pixel(x, y));
        }
    }
    sum / area.area() as f64
}

/// Blocks whose average brightness differs between `first` and `second`.
///
/// Both images are divided into a grid of roughly
/// [`COMPARE_BLOCK_SIZE`]-pixel blocks; a block is reported when its
/// brightness differs by at least [`COMPARE_THRESHOLD`]. With
/// `merge_adjacent`, touching or overlapping blocks are unioned (see
/// [`merge_adjacent`]).
pub fn compare(
    first: &RasterImage,
    second: &RasterImage,
    merge: bool,
) -> Result<Vec<Rect>, RasterError> {
    if first.dimensions() != second.dimensions() {
        return Err(RasterError::DimensionMismatch {
            left: first.dimensions(),
            right: second.dimensions(),
        });
    }

    let columns = partition(first.width(), COMPARE_BLOCK_SIZE);
    let rows = partition(first.height(), COMPARE_BLOCK_SIZE);
    let blocks: Vec<Rect> = rows
        .iter()
        .flat_map(|&(y, h)| columns.iter().map(move |&(x, w)| Rect::new(x, y, w, h)))
        .collect();

    let changes: Vec<Rect> = blocks
        .into_par_iter()
        .filter(|block| {
            let a = average_brightness(first, Some(*block));
            let b = average_brightness(second, Some(*block));
            (a - b).abs() >= COMPARE_THRESHOLD
        })
        .collect();

    Ok(if merge {
        merge_adjacent(changes)
    } else {
        changes
    })
}

/// Union every pair of rectangles that touch or overlap, repeating until
/// no pair touches. The result covers the same bounding regions whatever
/// the input order.
pub fn merge_adjacent(mut rects: Vec<Rect>) -> Vec<Rect> {
    loop {
        let mut merged = false;
        let mut i = 0;
        while i < rects.len() {
            let mut j = i + 1;
            while j < rects.len() {
                if rects[i].touches(&rects[j]) {
                    let other = rects.swap_remove(j);
                    rects[i] = rects[i].union(&other);
                    merged = true;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if !merged {
            return rects;
        }
    }
}

// ============================================================================
// Pixel helpers
// ============================================================================

fn luminance(p: &Rgba<u8>) -> f64 {
    LUMA_RED * p[0] as f64 + LUMA_GREEN * p[1] as f64 + LUMA_BLUE * p[2] as f64
}

fn premultiply(p: Rgba<u8>) -> [f64; 4] {
    let a = p[3] as f64 / 255.0;
    [p[0] as f64 * a, p[1] as f64 * a, p[2] as f64 * a, p[3] as f64]
}

fn unpremultiply(c: [f64; 4]) -> Rgba<u8> {
    if c[3] <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let a = c[3] / 255.0;
    let channel = |v: f64| (v / a).round().clamp(0.0, 255.0) as u8;
    Rgba([
        channel(c[0]),
        channel(c[1]),
        channel(c[2]),
        c[3].round().clamp(0.0, 255.0) as u8,
    ])
}

/// Bilinear sample in premultiplied space at pixel coordinates `(fx, fy)`;
/// neighbours outside the image read as `outside`.
fn sample_bilinear(img: &RgbaImage, fx: f64, fy: f64, outside: [f64; 4]) -> [f64; 4] {
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let (w, h) = (img.width() as i64, img.height() as i64);

    let fetch = |x: i64, y: i64| {
        if x < 0 || y < 0 || x >= w || y >= h {
            outside
        } else {
            premultiply(*img.get_pixel(x as u32, y as u32))
        }
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0.0; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - tx) + p10[c] * tx;
        let bottom = p01[c] * (1.0 - tx) + p11[c] * tx;
        out[c] = top * (1.0 - ty) + bottom * ty;
    }
    out
}

/// Source-over composite of `fg` onto an opaque-or-not `bg`.
fn over(fg: Rgba<u8>, bg: Rgba<u8>) -> Rgba<u8> {
    let fa = fg[3] as f64 / 255.0;
    let ba = bg[3] as f64 / 255.0;
    let out_a = fa + ba * (1.0 - fa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |f: u8, b: u8| {
        ((f as f64 * fa + b as f64 * ba * (1.0 - fa)) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(fg[0], bg[0]),
        channel(fg[1], bg[1]),
        channel(fg[2], bg[2]),
        (out_a * 255.0).round() as u8,
    ])
}

fn flatten(mut pixels: RgbaImage, background: Rgba<u8>) -> RgbaImage {
    for p in pixels.pixels_mut() {
        *p = over(*p, background);
    }
    pixels
}
