//! In-process image cache with a byte budget.
//!
//! The index maps keys to [`Weak`] references, so an entry lives exactly as
//! long as somebody holds its [`SharedImage`]. The cache itself holds strong
//! references for the most recently used entries, up to `budget` bytes of
//! pixel data; past that the least recently used strong reference is
//! dropped. An entry whose last strong reference is gone is *reclaimed*:
//! `get` reports it absent and the next purge removes it from the index.

use super::{CacheError, ImageCache, SharedImage};
use crate::imaging::RasterImage;
use lru::LruCache;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

/// Default byte budget for retained images (256 MiB).
pub const DEFAULT_MEMORY_BUDGET: usize = 256 * 1024 * 1024;

pub struct MemoryCache {
    state: Mutex<MemoryState>,
}

struct MemoryState {
    entries: HashMap<String, Weak<RasterImage>>,
    retained: LruCache<String, SharedImage>,
    retained_bytes: usize,
    budget: usize,
}

impl MemoryState {
    /// Hold a strong reference to `image`, then shed the oldest ones until
    /// the budget is met again.
    fn retain(&mut self, key: &str, image: SharedImage) {
        let size = image.byte_size();
        if let Some((_, previous)) = self.retained.push(key.to_string(), image) {
            self.retained_bytes -= previous.byte_size();
        }
        self.retained_bytes += size;

        while self.retained_bytes > self.budget {
            let Some((evicted, image)) = self.retained.pop_lru() else {
                break;
            };
            self.retained_bytes -= image.byte_size();
            debug!(key = %evicted, bytes = image.byte_size(), "memory budget exceeded, released entry");
        }
    }

    fn release(&mut self, key: &str) {
        if let Some(image) = self.retained.pop(key) {
            self.retained_bytes -= image.byte_size();
        }
    }

    fn purge(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, image| image.strong_count() > 0);
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(purged, "purged reclaimed memory entries");
        }
    }
}

impl MemoryCache {
    /// Cache keeping at most `budget` bytes of pixel data alive on its own.
    pub fn new(budget: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                entries: HashMap::new(),
                retained: LruCache::unbounded(),
                retained_bytes: 0,
                budget,
            }),
        }
    }

    /// Store `image` under `key`, then purge reclaimed entries.
    pub fn put(&self, key: &str, image: SharedImage) {
        let mut state = self.state();
        state.entries.insert(key.to_string(), Arc::downgrade(&image));
        state.retain(key, image);
        state.purge();
    }

    /// Live image for `key`. A hit becomes the most recently used entry.
    pub fn get(&self, key: &str) -> Option<SharedImage> {
        let mut state = self.state();
        let image = state.entries.get(key)?.upgrade()?;
        state.retain(key, image.clone());
        Some(image)
    }

    /// Drop `key`, then purge reclaimed entries. Missing keys are ignored.
    pub fn remove(&self, key: &str) {
        let mut state = self.state();
        state.entries.remove(key);
        state.release(key);
        state.purge();
    }

    /// Drop every entry. No purge is needed afterwards.
    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.retained.clear();
        state.retained_bytes = 0;
    }

    /// Remove index entries whose image has been reclaimed.
    pub fn purge(&self) {
        self.state().purge();
    }

    /// Number of index entries, including reclaimed ones not yet purged.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of pixel data currently kept alive by the cache itself.
    pub fn retained_bytes(&self) -> usize {
        self.state().retained_bytes
    }

    pub fn budget(&self) -> usize {
        self.state().budget
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_BUDGET)
    }
}

impl ImageCache for MemoryCache {
    fn add(&self, key: &str, image: SharedImage) -> Result<(), CacheError> {
        self.put(key, image);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<SharedImage> {
        MemoryCache::get(self, key)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        MemoryCache::remove(self, key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        MemoryCache::clear(self);
        Ok(())
    }
}
