//! Image processing in pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | `image` codecs behind [`ImageCodec`] |
//! | **Resize** | progressive `imageops::resize` (Triangle) steps |
//! | **Crop / flip / quarter turns** | `imageops` |
//! | **Free rotation, shadow blur, brightness** | hand-written over RGBA8 buffers |
//! | **Compare** | per-block brightness on the rayon pool |
//!
//! The module is split into:
//! - **Raster**: [`RasterImage`] and [`Rect`]
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Operations**: Pixel operations combining calculations and raster data

pub mod backend;
mod calculations;
pub mod operations;
mod params;
mod raster;
pub mod rust_backend;

pub use backend::{BackendError, ImageCodec};
pub use calculations::{calculate_size, resize_steps};
pub use operations::RasterError;
pub use params::{OutputFormat, Quality, ResizeMode, ShadowParams};
pub use raster::{RasterImage, Rect};
pub use rust_backend::{RustCodec, is_image_file, supported_input_extensions};
