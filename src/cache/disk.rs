//! Directory-backed image cache. One encoded file per entry.

use super::{CacheError, ImageCache, SharedImage, clear_dir_contents};
use crate::imaging::{BackendError, ImageCodec, OutputFormat, RustCodec};
use crate::key::file_name_for_key;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Persistent cache rooted at a directory.
///
/// Entries live at `<root>/<file_name_for_key(key)>.<ext>`, encoded in the
/// store's fixed [`OutputFormat`]. The root is created on construction.
pub struct DiskCache {
    root: PathBuf,
    format: OutputFormat,
    codec: Arc<dyn ImageCodec>,
    lock: Mutex<()>,
}

impl DiskCache {
    /// Open (creating if needed) a cache at `root`.
    ///
    /// Fails with [`CacheError::InvalidConfiguration`] when `root` exists but
    /// is not a directory, or cannot be created.
    pub fn new(
        root: impl Into<PathBuf>,
        format: OutputFormat,
        codec: Arc<dyn ImageCodec>,
    ) -> Result<Self, CacheError> {
        let root = root.into();
        if root.exists() && !root.is_dir() {
            return Err(CacheError::InvalidConfiguration {
                path: root,
                reason: "exists and is not a directory".to_string(),
            });
        }
        std::fs::create_dir_all(&root).map_err(|e| CacheError::InvalidConfiguration {
            path: root.clone(),
            reason: e.to_string(),
        })?;
        debug!(root = %root.display(), %format, "opened disk cache");
        Ok(Self {
            root,
            format,
            codec,
            lock: Mutex::new(()),
        })
    }

    /// PNG cache using the built-in codec.
    pub fn with_defaults(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::new(root, OutputFormat::Png, Arc::new(RustCodec::default()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Where the entry for `key` is (or would be) stored.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", file_name_for_key(key), self.format.extension()))
    }

    pub fn contains(&self, key: &str) -> bool {
        let _guard = self.guard();
        self.entry_path(key).is_file()
    }

    /// Number of entry files directly under the root.
    pub fn len(&self) -> usize {
        let _guard = self.guard();
        let ext = self.format.extension();
        std::fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().is_file())
                    .filter(|e| e.path().extension().is_some_and(|x| x == ext))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Set the file's mtime to now.
fn touch(path: &Path) -> std::io::Result<()> {
    std::fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(SystemTime::now())
}

impl ImageCache for DiskCache {
    fn add(&self, key: &str, image: SharedImage) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let write_failed = |source: BackendError| CacheError::WriteFailed {
            path: path.clone(),
            source,
        };
        let bytes = self.codec.encode(&image, self.format).map_err(write_failed)?;

        let _guard = self.guard();
        // The root may have been removed from outside since construction.
        std::fs::create_dir_all(&self.root).map_err(|e| write_failed(e.into()))?;
        std::fs::write(&path, bytes).map_err(|e| write_failed(e.into()))?;
        debug!(key, path = %path.display(), "stored cache entry");
        Ok(())
    }

    fn get(&self, key: &str) -> Option<SharedImage> {
        let path = self.entry_path(key);
        let _guard = self.guard();
        if !path.is_file() {
            debug!(key, "disk cache miss");
            return None;
        }
        match self.codec.decode_file(&path) {
            Ok(image) => {
                if let Err(e) = touch(&path) {
                    info!(path = %path.display(), error = %e, "could not refresh cache entry mtime");
                }
                debug!(key, "disk cache hit");
                Some(Arc::new(image))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache entry, treating as miss");
                None
            }
        }
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let _guard = self.guard();
        std::fs::remove_file(&path).map_err(|source| CacheError::DeletionFailed { path, source })
    }

    fn clear(&self) -> Result<(), CacheError> {
        let _guard = self.guard();
        clear_dir_contents(&self.root)?;
        debug!(root = %self.root.display(), "cleared disk cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockCodec;
    use crate::test_helpers::{backdate, gradient, write_png};
    use tempfile::TempDir;

    fn cache_in(tmp: &TempDir) -> DiskCache {
        DiskCache::with_defaults(tmp.path().join("cache")).unwrap()
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn new_creates_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("a/b/c");
        let cache = DiskCache::with_defaults(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(cache.root(), root);
        assert!(cache.is_empty());
    }

    #[test]
    fn new_rejects_file_as_root() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            DiskCache::with_defaults(&file),
            Err(CacheError::InvalidConfiguration { .. })
        ));
    }

    // =========================================================================
    // add / get
    // =========================================================================

    #[test]
    fn add_recreates_removed_root() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        std::fs::remove_dir_all(cache.root()).unwrap();

        cache.add("k", Arc::new(gradient(4, 4))).unwrap();
        assert!(cache.root().is_dir());
        assert!(cache.contains("k"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn add_then_get_returns_equal_image() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let img = Arc::new(gradient(20, 10));

        cache.add("k1", img.clone()).unwrap();
        assert!(cache.contains("k1"));
        assert_eq!(cache.len(), 1);

        let back = cache.get("k1").unwrap();
        assert_eq!(*back, *img);
    }

    #[test]
    fn entry_file_is_named_from_key() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        cache.add("/x/y.jpg_1_2", Arc::new(gradient(4, 4))).unwrap();
        let path = cache.entry_path("/x/y.jpg_1_2");
        assert!(path.is_file());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("_x_y_jpg_1_2_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn get_missing_key_is_none_without_decoding() {
        let tmp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec::new());
        let cache = DiskCache::new(tmp.path(), OutputFormat::Png, codec.clone()).unwrap();
        assert!(cache.get("nothing").is_none());
        assert_eq!(codec.decode_count(), 0);
    }

    #[test]
    fn get_corrupt_entry_is_none() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        std::fs::write(cache.entry_path("bad"), b"not a png").unwrap();
        assert!(cache.get("bad").is_none());
        // Corrupt entries are left for clear() to reclaim
        assert!(cache.contains("bad"));
    }

    #[test]
    fn get_touches_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        cache.add("k", Arc::new(gradient(4, 4))).unwrap();
        let path = cache.entry_path("k");
        backdate(&path, 86_400);
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        cache.get("k").unwrap();

        let after = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(after > before);
    }

    #[test]
    fn jpeg_store_writes_jpg_files() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskCache::new(
            tmp.path(),
            OutputFormat::Jpeg,
            Arc::new(RustCodec::default()),
        )
        .unwrap();
        cache.add("k", Arc::new(gradient(16, 16))).unwrap();
        assert!(cache.entry_path("k").to_string_lossy().ends_with(".jpg"));
        assert_eq!(cache.get("k").unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn encode_failure_is_write_failed() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskCache::new(
            tmp.path(),
            OutputFormat::Png,
            Arc::new(MockCodec::failing_encode()),
        )
        .unwrap();
        let result = cache.add("k", Arc::new(gradient(4, 4)));
        assert!(matches!(result, Err(CacheError::WriteFailed { .. })));
        assert!(!cache.contains("k"));
    }

    // =========================================================================
    // remove / clear
    // =========================================================================

    #[test]
    fn remove_deletes_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        cache.add("k", Arc::new(gradient(4, 4))).unwrap();
        cache.remove("k").unwrap();
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn remove_missing_entry_fails() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        assert!(matches!(
            cache.remove("never-added"),
            Err(CacheError::DeletionFailed { .. })
        ));
    }

    #[test]
    fn clear_empties_root_but_keeps_it() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        for key in ["a", "b", "c"] {
            cache.add(key, Arc::new(gradient(4, 4))).unwrap();
        }
        assert_eq!(cache.len(), 3);

        cache.clear().unwrap();

        assert!(cache.root().is_dir());
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    // =========================================================================
    // File-keyed helpers
    // =========================================================================

    #[test]
    fn file_keyed_entries_follow_source_changes() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let source = tmp.path().join("photo.png");
        write_png(&source, 8, 8);

        cache
            .add_for_file(Arc::new(gradient(4, 4)), &source, &["small"])
            .unwrap();
        assert!(cache.get_for_file(&source, &["small"]).unwrap().is_some());
        assert!(cache.get_for_file(&source, &["large"]).unwrap().is_none());

        // Modifying the source invalidates the key
        backdate(&source, 3600);
        assert!(cache.get_for_file(&source, &["small"]).unwrap().is_none());
    }

    #[test]
    fn file_keyed_remove() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let source = tmp.path().join("photo.png");
        write_png(&source, 8, 8);

        cache.add_for_file(Arc::new(gradient(4, 4)), &source, &[]).unwrap();
        cache.remove_for_file(&source, &[]).unwrap();
        assert!(cache.get_for_file(&source, &[]).unwrap().is_none());
    }

    #[test]
    fn file_keyed_missing_source_is_key_error() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let result = cache.get_for_file(Path::new("/nonexistent.png"), &[]);
        assert!(matches!(result, Err(CacheError::Key(_))));
    }
}
