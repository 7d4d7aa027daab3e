//! Cache keys derived from source-file identity.
//!
//! A key fingerprints a file by *where it is and what it looks like on the
//! filesystem*, without reading its contents:
//!
//! ```text
//! /photos/2024/IMG_0001.jpg_1718000000123_2457811
//! └──── absolute path ────┘ └ mtime ms ─┘ └ bytes ┘
//! ```
//!
//! Touching or rewriting the file changes the mtime (and usually the
//! length), so stale derivatives are never served: they simply stop being
//! looked up. Extra discriminators such as the resize mode and target box
//! are appended with [`compound_key`].
//!
//! The path is written losslessly: `%` becomes `%25` and bytes that are not
//! valid UTF-8 become `%XX`.
//!
//! Keys are free-form strings; [`file_name_for_key`] maps them to a
//! filesystem-safe name that is unique per key.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;

/// Separator between key components.
pub const SEPARATOR: &str = "_";

/// Longest sanitized prefix kept in a file name. With the `_` joiner, the
/// 64-char digest, and an extension this stays well under the usual
/// 255-byte name limit.
const MAX_PREFIX_LEN: usize = 160;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("A compound key needs at least one part")]
    NoParts,
    #[error("Cannot fingerprint {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Key for `path`: `<absolute path>_<mtime millis>_<byte length>`.
///
/// The path is made absolute against the current directory but symlinks
/// are not resolved.
pub fn key_from_file(path: &Path) -> Result<String, KeyError> {
    let io_err = |source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    };
    let absolute = std::path::absolute(path).map_err(io_err)?;
    let meta = std::fs::metadata(&absolute).map_err(io_err)?;
    let modified = meta.modified().map_err(io_err)?;
    // Pre-epoch mtimes are clamped to 0 rather than rejected.
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    Ok(format!(
        "{}{SEPARATOR}{millis}{SEPARATOR}{}",
        path_component(&absolute),
        meta.len()
    ))
}

/// Lossless text form of `path`.
///
/// Valid UTF-8 is kept as is with `%` written as `%25`; bytes that are not
/// valid UTF-8 become `%XX`. Distinct paths never share a form.
fn path_component(path: &Path) -> String {
    let bytes = path.as_os_str().as_encoded_bytes();
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(&chunk.valid().replace('%', "%25"));
        for byte in chunk.invalid() {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Join `parts` in order with [`SEPARATOR`].
///
/// A single part is returned unchanged; an empty list is an error.
pub fn compound_key<S: AsRef<str>>(parts: &[S]) -> Result<String, KeyError> {
    match parts {
        [] => Err(KeyError::NoParts),
        [only] => Ok(only.as_ref().to_string()),
        _ => Ok(parts
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(SEPARATOR)),
    }
}

/// Key for `path` followed by extra discriminators.
pub fn key_for_file_with<S: AsRef<str>>(path: &Path, extra: &[S]) -> Result<String, KeyError> {
    let mut parts = vec![key_from_file(path)?];
    parts.extend(extra.iter().map(|s| s.as_ref().to_string()));
    compound_key(&parts)
}

/// Filesystem-safe file name (without extension) for `key`.
///
/// Every character outside `[A-Za-z0-9-]` becomes `_`; the result is cut to
/// its last [`MAX_PREFIX_LEN`] characters and followed by `_` and the
/// SHA-256 hex digest of the original key. Distinct keys always produce
/// distinct names, even when their sanitized forms collide.
pub fn file_name_for_key(key: &str) -> String {
    let sanitized: Vec<char> = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let start = sanitized.len().saturating_sub(MAX_PREFIX_LEN);
    let prefix: String = sanitized[start..].iter().collect();

    let digest = Sha256::digest(key.as_bytes());
    format!("{prefix}_{digest:x}")
}
