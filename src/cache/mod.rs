//! Image caches: a persistent disk store and a memory-budgeted in-process
//! store, behind one [`ImageCache`] trait.
//!
//! # Design
//!
//! Both stores map string keys (see [`crate::key`]) to decoded images.
//! Keys fingerprint the *source* file, so entries are never invalidated in
//! place: when a source changes its key changes, and the old entry is just
//! never asked for again. Stale entries are reclaimed by `clear()`.
//!
//! - [`DiskCache`] encodes each entry to `<root>/<file name>.<ext>`. Reads
//!   touch the entry's mtime so an external sweeper can expire by age. A
//!   corrupt entry reads as a miss and is logged.
//! - [`MemoryCache`] holds decoded images as [`SharedImage`]s. A byte budget
//!   bounds how many it keeps alive; past the budget an entry survives only
//!   while some caller still holds it.
//!
//! Every public operation on a store takes that store's single lock, so a
//! store can be shared across threads as-is.

mod disk;
mod memory;

pub use disk::DiskCache;
pub use memory::{DEFAULT_MEMORY_BUDGET, MemoryCache};

use crate::imaging::{BackendError, RasterImage};
use crate::key::{self, KeyError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

/// Decoded image shared between caches and callers.
pub type SharedImage = Arc<RasterImage>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache location {path}: {reason}")]
    InvalidConfiguration { path: PathBuf, reason: String },
    #[error("Failed to write cache entry {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("Failed to delete {path}: {source}")]
    DeletionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Key/image store.
///
/// The `*_for_file` helpers derive the key from a source file plus extra
/// discriminators (see [`key::key_for_file_with`]).
pub trait ImageCache: Send + Sync {
    /// Store `image` under `key`.
    fn add(&self, key: &str, image: SharedImage) -> Result<(), CacheError>;

    /// Look up `key`. Absent, unreadable, and reclaimed entries all read as `None`.
    fn get(&self, key: &str) -> Option<SharedImage>;

    /// Delete the entry for `key`.
    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every entry.
    fn clear(&self) -> Result<(), CacheError>;

    fn add_for_file(&self, image: SharedImage, file: &Path, extra: &[&str]) -> Result<(), CacheError> {
        let key = key::key_for_file_with(file, extra)?;
        self.add(&key, image)
    }

    fn get_for_file(&self, file: &Path, extra: &[&str]) -> Result<Option<SharedImage>, CacheError> {
        let key = key::key_for_file_with(file, extra)?;
        Ok(self.get(&key))
    }

    fn remove_for_file(&self, file: &Path, extra: &[&str]) -> Result<(), CacheError> {
        let key = key::key_for_file_with(file, extra)?;
        self.remove(&key)
    }
}

/// Delete everything below `root`, leaving `root` itself in place.
///
/// Children are removed before their parents. A missing `root` is already
/// clear.
pub(crate) fn clear_dir_contents(root: &Path) -> Result<(), CacheError> {
    if !root.exists() {
        return Ok(());
    }
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| CacheError::DeletionFailed {
            path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
            source: e.into(),
        })?;
        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        };
        result.map_err(|source| CacheError::DeletionFailed {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Lookup outcome counters for a thumbnail service.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from the memory tier.
    pub memory_hits: u32,
    /// Served from a disk bucket.
    pub disk_hits: u32,
    /// Generated from the source image.
    pub generated: u32,
    /// Not cached and not generated.
    pub misses: u32,
}

impl CacheStats {
    pub fn memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    pub fn generate(&mut self) {
        self.generated += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn hits(&self) -> u32 {
        self.memory_hits + self.disk_hits
    }

    pub fn total(&self) -> u32 {
        self.hits() + self.generated + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits() == 0 && self.misses == 0 {
            return write!(f, "{} generated", self.generated);
        }
        if self.memory_hits > 0 {
            write!(f, "{} from memory, ", self.memory_hits)?;
        }
        write!(f, "{} cached, {} generated", self.disk_hits, self.generated)?;
        if self.misses > 0 {
            write!(f, ", {} missing", self.misses)?;
        }
        write!(f, " ({} total)", self.total())
    }
}
