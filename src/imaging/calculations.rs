//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or pixels. The
//! pixel-level code in [`operations`](super::operations) asks these for
//! every size it produces.

use super::params::ResizeMode;

/// Per-step scale factor when shrinking.
pub const SHRINK_FACTOR: f64 = 0.5;
/// Per-step scale factor when growing.
pub const GROW_FACTOR: f64 = 1.5;

/// Calculate the aspect-preserving size of `source` resized into `target`.
///
/// The width is tried first (`w = target_w`, `h = w / ratio`); if that
/// overflows the box (FIT) or falls short of it (FILL), the height is pinned
/// instead. Integer conversion truncates. Zero dimensions are clamped to 1.
///
/// # Examples
/// ```
/// # use thumbcache::imaging::{ResizeMode, calculate_size};
/// // 400x300 into a 200x200 box
/// assert_eq!(calculate_size(ResizeMode::Fit, (400, 300), (200, 200)), (200, 150));
/// assert_eq!(calculate_size(ResizeMode::Fill, (400, 300), (200, 200)), (266, 200));
/// ```
pub fn calculate_size(mode: ResizeMode, source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    if source == target {
        return target;
    }
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    if src_w == 0 || src_h == 0 {
        return (tgt_w.max(1), tgt_h.max(1));
    }

    let ratio = src_w as f64 / src_h as f64;

    let mut w = tgt_w;
    let mut h = (w as f64 / ratio) as u32;

    let pin_height = match mode {
        ResizeMode::Fit => h > tgt_h,
        ResizeMode::Fill => h < tgt_h,
    };
    if pin_height {
        h = tgt_h;
        w = (h as f64 * ratio) as u32;
    }

    (w.max(1), h.max(1))
}

/// Intermediate sizes for progressive resampling from `source` to `target`.
///
/// Each step scales the previous size by [`SHRINK_FACTOR`] or
/// [`GROW_FACTOR`]; as soon as the next step would reach or cross the target
/// in either dimension, the last step snaps to `target` exactly. The returned
/// list always ends with `target`, and is empty when no resize is needed.
///
/// Growing steps add at least one pixel so tiny images cannot stall.
pub fn resize_steps(source: (u32, u32), target: (u32, u32)) -> Vec<(u32, u32)> {
    if source == target {
        return Vec::new();
    }
    let (tgt_w, tgt_h) = target;
    let shrinking = tgt_w < source.0 || (tgt_w == source.0 && tgt_h < source.1);
    let factor = if shrinking {
        SHRINK_FACTOR
    } else {
        GROW_FACTOR
    };

    let (mut w, mut h) = source;
    let mut steps = Vec::new();
    loop {
        let mut next_w = ((w as f64 * factor) as u32).max(1);
        let mut next_h = ((h as f64 * factor) as u32).max(1);
        if !shrinking {
            next_w = next_w.max(w + 1);
            next_h = next_h.max(h + 1);
        }

        let crossed = if shrinking {
            next_w <= tgt_w || next_h <= tgt_h
        } else {
            next_w >= tgt_w || next_h >= tgt_h
        };
        if crossed {
            steps.push(target);
            return steps;
        }

        steps.push((next_w, next_h));
        w = next_w;
        h = next_h;
    }
}

/// Offset of a centered `crop` inside `source`. Negative when the crop is
/// larger than the source.
pub fn center_offset(source: (u32, u32), crop: (u32, u32)) -> (i64, i64) {
    (
        (source.0 as i64 - crop.0 as i64) / 2,
        (source.1 as i64 - crop.1 as i64) / 2,
    )
}

/// Number of clockwise quarter turns (0–3) when `degrees` is an exact
/// multiple of 90.
pub fn quarter_turns(degrees: f64) -> Option<u32> {
    let turns = degrees / 90.0;
    if turns.is_finite() && turns.fract() == 0.0 {
        Some((turns as i64).rem_euclid(4) as u32)
    } else {
        None
    }
}

/// Bounding box of a `width x height` rectangle rotated by `degrees`.
pub fn rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    if let Some(turns) = quarter_turns(degrees) {
        return if turns % 2 == 0 {
            (width, height)
        } else {
            (height, width)
        };
    }
    let radians = degrees.to_radians();
    let sin = radians.sin().abs();
    let cos = radians.cos().abs();
    let (w, h) = (width as f64, height as f64);
    (
        (w * cos + h * sin).floor() as u32,
        (h * cos + w * sin).floor() as u32,
    )
}

/// Shadow displacement for a light direction `angle` (degrees) and `distance`.
pub fn shadow_offset(angle: f64, distance: u32) -> (i64, i64) {
    let radians = angle.to_radians();
    (
        (radians.cos() * distance as f64) as i64,
        (radians.sin() * distance as f64) as i64,
    )
}

/// Split `length` pixels into blocks of roughly `block` pixels.
///
/// The block count is `max(1, length / block)`; the `length % count`
/// leftover pixels go one each to the first blocks, so the spans cover
/// `0..length` exactly. Returns `(start, len)` pairs; empty for `length == 0`.
pub fn partition(length: u32, block: u32) -> Vec<(u32, u32)> {
    if length == 0 {
        return Vec::new();
    }
    let count = (length / block.max(1)).max(1);
    let base = length / count;
    let remainder = length % count;

    let mut spans = Vec::with_capacity(count as usize);
    let mut start = 0;
    for i in 0..count {
        let len = if i < remainder { base + 1 } else { base };
        spans.push((start, len));
        start += len;
    }
    spans
}
