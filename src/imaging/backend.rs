//! Image codec trait and shared types.
//!
//! The [`ImageCodec`] trait is the seam between pixel code and file formats:
//! the caches hand it bytes or paths and get [`RasterImage`]s back, and hand
//! it a [`RasterImage`] plus an [`OutputFormat`] to get encoded bytes.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec), built on the `image`
//! crate. Tests substitute the [`MockCodec`](tests::MockCodec) below to
//! count calls and inject failures.

use super::params::OutputFormat;
use super::raster::RasterImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image as {format}: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },
}

/// Decode and encode raster images.
///
/// Implementations must be `Send + Sync`; a single codec is shared by every
/// cache bucket behind an `Arc`.
pub trait ImageCodec: Send + Sync {
    /// Decode an in-memory encoded image.
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, BackendError>;

    /// Encode `image` in `format`.
    fn encode(&self, image: &RasterImage, format: OutputFormat) -> Result<Vec<u8>, BackendError>;

    /// Read and decode a file.
    fn decode_file(&self, path: &Path) -> Result<RasterImage, BackendError> {
        let bytes = std::fs::read(path)?;
        self.decode(&bytes)
    }
}
