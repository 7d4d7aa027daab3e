//! # thumbcache
//!
//! Thumbnail generation with a two-tier cache. A request names a source
//! image, a target box and a resize mode; the answer comes from memory, from
//! disk, or is generated on the spot and remembered in both.
//!
//! # Architecture: Request Path
//!
//! ```text
//! source + WxH + mode
//!   │
//!   ├─ key        absolute path + mtime + length + mode + WxH
//!   ├─ memory     MemoryCache (byte budget, Weak-backed)
//!   ├─ disk       <root>/<W>_<H>/<sanitized key>_<sha256>.png
//!   └─ generate   decode → auto-orient → progressive resize → persist
//! ```
//!
//! Keys fingerprint the source file instead of hashing its contents, so a
//! lookup costs one `stat`. Any edit to the source changes its mtime and
//! therefore its key; stale thumbnails are never served, only left behind
//! for `clear` to reclaim.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | `RasterImage`, pixel operations (resize, crop, rotate, flip, border, shadow, compare), `ImageCodec` |
//! | [`key`] | File fingerprints, compound keys, filesystem-safe names |
//! | [`cache`] | `ImageCache` trait, `DiskCache`, `MemoryCache`, `CacheStats` |
//! | [`thumbnails`] | `ThumbnailService`: per-size buckets over the caches |
//! | [`metadata`] | `MetadataHandler` trait and the null handler |
//! | [`config`] | `config.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Progressive Resampling
//!
//! Resizing by a large factor in a single bilinear pass samples only a few
//! source pixels per output pixel and aliases. [`imaging::operations::resize_to`]
//! halves (or grows by 1.5x) repeatedly and snaps the last step to the exact
//! target, which keeps thumbnails smooth without a heavier filter.
//!
//! ## Reclaimable Memory Entries
//!
//! The memory tier indexes images through `Weak` references and keeps a
//! byte-budgeted LRU of strong ones. An image still in use by a caller stays
//! reachable beyond the budget; one nobody holds disappears and is purged on
//! the next mutation.
//!
//! ## Explicit Metadata Handler
//!
//! Auto-orientation needs EXIF, which this crate does not parse. The handler
//! is injected per service ([`thumbnails::ThumbnailService::with_metadata_handler`]);
//! the default handler reports "not implemented" and sources are used as
//! decoded.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod key;
pub mod metadata;
pub mod output;
pub mod thumbnails;

#[cfg(test)]
pub(crate) mod test_helpers;
