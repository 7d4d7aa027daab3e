//! Thumbnail service: lookup, generation, and persistence of resized images.
//!
//! ## Storage
//!
//! Thumbnails are grouped by requested box into *buckets*, one
//! [`DiskCache`] per size:
//!
//! ```text
//! <root>/
//! ├── 100_100/
//! │   ├── _photos_a_jpg_1718000000123_2457811_fill_100x100_<sha256>.png
//! │   └── _photos_b_jpg_1718000004567_1988012_fill_100x100_<sha256>.png
//! └── 200_200/
//!     └── ...
//! ```
//!
//! A bucket directory is created the first time something is written to
//! it; lookups never create directories.
//!
//! ## Request flow
//!
//! 1. Key = source fingerprint + mode marker + `WxH` (see [`crate::key`]).
//! 2. Memory tier (if enabled), then the disk bucket. An unreadable disk
//!    entry is a miss.
//! 3. On a miss with `create_if_missing`: decode the source, auto-orient it
//!    when the metadata handler reports an orientation, resize, persist,
//!    and populate the memory tier. A failed write is logged and the
//!    thumbnail is still returned. An unreadable source fails the request.
//!
//! All requests on one service are serialized by a single lock.

use crate::cache::{
    CacheError, CacheStats, DiskCache, ImageCache, MemoryCache, SharedImage, clear_dir_contents,
};
use crate::config::CacheConfig;
use crate::imaging::operations::{apply_orientation, resize_to};
use crate::imaging::{BackendError, ImageCodec, OutputFormat, RasterImage, ResizeMode, RustCodec};
use crate::key::{KeyError, compound_key, key_from_file};
use crate::metadata::{MetadataHandler, UnsupportedMetadataHandler};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Cannot read source image {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("Thumbnail size must be non-zero, got {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Generates and caches thumbnails under a root directory.
pub struct ThumbnailService {
    root: PathBuf,
    format: OutputFormat,
    codec: Arc<dyn ImageCodec>,
    memory: Option<MemoryCache>,
    metadata: Arc<dyn MetadataHandler>,
    state: Mutex<ServiceState>,
}

#[derive(Default)]
struct ServiceState {
    buckets: HashMap<(u32, u32), Arc<DiskCache>>,
    stats: CacheStats,
}

/// Cache key for a thumbnail of `source`.
pub fn thumbnail_key(
    source: &Path,
    width: u32,
    height: u32,
    mode: ResizeMode,
) -> Result<String, KeyError> {
    compound_key(&[
        key_from_file(source)?,
        mode.marker().to_string(),
        format!("{width}x{height}"),
    ])
}

/// Validate the requested box and derive the cache key. A source that
/// cannot be fingerprinted is unreadable.
fn request_key(
    source: &Path,
    width: u32,
    height: u32,
    mode: ResizeMode,
) -> Result<String, ThumbnailError> {
    if width == 0 || height == 0 {
        return Err(ThumbnailError::InvalidSize { width, height });
    }
    thumbnail_key(source, width, height, mode).map_err(|e| match e {
        KeyError::Io { path, source } => ThumbnailError::SourceUnreadable {
            path,
            source: BackendError::Io(source),
        },
        other => ThumbnailError::Key(other),
    })
}

/// Bucket directory name for a `width x height` box.
pub fn bucket_name(width: u32, height: u32) -> String {
    format!("{width}_{height}")
}

impl ThumbnailService {
    /// PNG thumbnails under `root`, no memory tier, no metadata handler.
    ///
    /// Creates `root`; fails with [`CacheError::InvalidConfiguration`] when it
    /// exists and is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ThumbnailError> {
        Self::with_codec(root, OutputFormat::Png, Arc::new(RustCodec::default()))
    }

    pub fn with_codec(
        root: impl Into<PathBuf>,
        format: OutputFormat,
        codec: Arc<dyn ImageCodec>,
    ) -> Result<Self, ThumbnailError> {
        let root = root.into();
        if root.exists() && !root.is_dir() {
            return Err(CacheError::InvalidConfiguration {
                path: root,
                reason: "exists and is not a directory".to_string(),
            }
            .into());
        }
        std::fs::create_dir_all(&root).map_err(|e| CacheError::InvalidConfiguration {
            path: root.clone(),
            reason: e.to_string(),
        })?;
        debug!(root = %root.display(), %format, "thumbnail service ready");

        Ok(Self {
            root,
            format,
            codec,
            memory: None,
            metadata: Arc::new(UnsupportedMetadataHandler),
            state: Mutex::new(ServiceState::default()),
        })
    }

    /// Service configured from `config`: root, format, quality, and memory tier.
    pub fn from_config(config: &CacheConfig) -> Result<Self, ThumbnailError> {
        let codec = Arc::new(RustCodec::new(config.quality()));
        let service = Self::with_codec(&config.cache_dir, config.thumbnails.format, codec)?;
        Ok(if config.memory.enabled {
            service.with_memory_cache(MemoryCache::new(config.memory.budget_bytes()))
        } else {
            service
        })
    }

    /// Add an in-memory tier in front of the disk buckets.
    pub fn with_memory_cache(mut self, memory: MemoryCache) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Use `handler` to auto-orient sources.
    pub fn with_metadata_handler(mut self, handler: Arc<dyn MetadataHandler>) -> Self {
        self.metadata = handler;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Directory holding thumbnails of `width x height`.
    pub fn bucket_dir(&self, width: u32, height: u32) -> PathBuf {
        self.root.join(bucket_name(width, height))
    }

    /// Thumbnail of `source` sized to `width x height`.
    ///
    /// Returns `Ok(None)` only when nothing is cached and `create_if_missing`
    /// is false.
    pub fn get(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        mode: ResizeMode,
        create_if_missing: bool,
    ) -> Result<Option<SharedImage>, ThumbnailError> {
        let key = request_key(source, width, height, mode)?;
        let mut state = self.state();

        if let Some(image) = self.lookup(&mut state, &key, width, height) {
            return Ok(Some(image));
        }
        if !create_if_missing {
            state.stats.miss();
            return Ok(None);
        }
        self.create(&mut state, &key, source, width, height, mode)
            .map(Some)
    }

    /// Cached or freshly generated thumbnail.
    pub fn get_or_create(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        mode: ResizeMode,
    ) -> Result<SharedImage, ThumbnailError> {
        let key = request_key(source, width, height, mode)?;
        let mut state = self.state();

        match self.lookup(&mut state, &key, width, height) {
            Some(image) => Ok(image),
            None => self.create(&mut state, &key, source, width, height, mode),
        }
    }

    /// Square FILL thumbnail of `size x size`.
    pub fn get_square(&self, source: &Path, size: u32) -> Result<SharedImage, ThumbnailError> {
        self.get_or_create(source, size, size, ResizeMode::Fill)
    }

    /// Delete every thumbnail file and bucket directory, and empty the memory
    /// tier. The root directory stays.
    pub fn clear(&self) -> Result<(), ThumbnailError> {
        let mut state = self.state();
        if let Some(memory) = &self.memory {
            memory.clear();
        }
        state.buckets.clear();
        clear_dir_contents(&self.root)?;
        debug!(root = %self.root.display(), "cleared thumbnails");
        Ok(())
    }

    /// Lookup counters since construction.
    pub fn stats(&self) -> CacheStats {
        self.state().stats
    }

    /// Number of thumbnail files stored for `width x height`.
    pub fn bucket_len(&self, width: u32, height: u32) -> usize {
        let mut state = self.state();
        self.existing_bucket(&mut state, width, height)
            .map_or(0, |bucket| bucket.len())
    }

    /// Memory tier, then disk bucket.
    fn lookup(
        &self,
        state: &mut ServiceState,
        key: &str,
        width: u32,
        height: u32,
    ) -> Option<SharedImage> {
        if let Some(image) = self.memory.as_ref().and_then(|m| m.get(key)) {
            debug!(key, "thumbnail served from memory");
            state.stats.memory_hit();
            return Some(image);
        }

        let image = self
            .existing_bucket(state, width, height)
            .and_then(|bucket| bucket.get(key))?;
        debug!(key, "thumbnail served from disk");
        state.stats.disk_hit();
        self.remember(key, &image);
        Some(image)
    }

    /// Generate, persist, and remember a thumbnail. Only a failure to read
    /// the source is an error.
    fn create(
        &self,
        state: &mut ServiceState,
        key: &str,
        source: &Path,
        width: u32,
        height: u32,
        mode: ResizeMode,
    ) -> Result<SharedImage, ThumbnailError> {
        let image: SharedImage = Arc::new(self.generate(source, width, height, mode)?);
        match self.writable_bucket(state, width, height) {
            Ok(bucket) => {
                if let Err(e) = bucket.add(key, image.clone()) {
                    warn!(source = %source.display(), error = %e, "failed to persist thumbnail");
                }
            }
            Err(e) => warn!(error = %e, "failed to open thumbnail bucket"),
        }
        self.remember(key, &image);
        state.stats.generate();
        debug!(key, "thumbnail generated");
        Ok(image)
    }

    fn generate(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        mode: ResizeMode,
    ) -> Result<RasterImage, ThumbnailError> {
        let image =
            self.codec
                .decode_file(source)
                .map_err(|e| ThumbnailError::SourceUnreadable {
                    path: source.to_path_buf(),
                    source: e,
                })?;

        let image = match self.metadata.get_orientation(source) {
            Ok(Some(orientation)) if orientation != 1 => {
                debug!(source = %source.display(), orientation, "auto-orienting source");
                apply_orientation(&image, orientation)
            }
            Ok(_) => image,
            Err(e) => {
                debug!(source = %source.display(), error = %e, "no orientation available");
                image
            }
        };

        Ok(resize_to(mode, &image, width, height).into_owned())
    }

    fn remember(&self, key: &str, image: &SharedImage) {
        if let Some(memory) = &self.memory {
            memory.put(key, image.clone());
        }
    }

    /// Bucket for `width x height` if its directory already exists.
    fn existing_bucket(
        &self,
        state: &mut ServiceState,
        width: u32,
        height: u32,
    ) -> Option<Arc<DiskCache>> {
        if let Some(bucket) = state.buckets.get(&(width, height)) {
            return Some(bucket.clone());
        }
        if !self.bucket_dir(width, height).is_dir() {
            return None;
        }
        match self.writable_bucket(state, width, height) {
            Ok(bucket) => Some(bucket),
            Err(e) => {
                warn!(error = %e, "ignoring unusable thumbnail bucket");
                None
            }
        }
    }

    /// Bucket for `width x height`, creating its directory if needed.
    fn writable_bucket(
        &self,
        state: &mut ServiceState,
        width: u32,
        height: u32,
    ) -> Result<Arc<DiskCache>, CacheError> {
        if let Some(bucket) = state.buckets.get(&(width, height)) {
            return Ok(bucket.clone());
        }
        let bucket = Arc::new(DiskCache::new(
            self.bucket_dir(width, height),
            self.format,
            self.codec.clone(),
        )?);
        state.buckets.insert((width, height), bucket.clone());
        Ok(bucket)
    }

    fn state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
