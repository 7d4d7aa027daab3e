//! Cache configuration module.
//!
//! Handles loading and validating `config.toml`. Every key is optional;
//! missing keys take the stock defaults and unknown keys are rejected to
//! catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! cache_dir = "~/.thumbcache/thumbnails"  # Root of the thumbnail buckets
//!
//! [thumbnails]
//! format = "png"            # png | jpeg
//! mode = "fill"             # fit | fill
//! quality = 90              # JPEG quality (1-100)
//!
//! [memory]
//! enabled = true            # Keep decoded thumbnails in memory
//! budget_mb = 256           # Memory the cache may keep alive on its own
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! A leading `~/` in `cache_dir` is expanded to the home directory.

use crate::imaging::{OutputFormat, Quality, ResizeMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cache root used when neither the config nor the command line names one.
const DEFAULT_CACHE_SUBDIR: &str = ".thumbcache/thumbnails";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Root directory of the thumbnail cache.
    pub cache_dir: PathBuf,
    /// Encoding and resize settings for generated thumbnails.
    pub thumbnails: ThumbnailsConfig,
    /// In-memory tier settings.
    pub memory: MemoryConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_CACHE_SUBDIR)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            thumbnails: ThumbnailsConfig::default(),
            memory: MemoryConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.thumbnails.quality) {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if self.memory.enabled && self.memory.budget_mb == 0 {
            return Err(ConfigError::Validation(
                "memory.budget_mb must be non-zero when the memory cache is enabled".into(),
            ));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation("cache_dir must not be empty".into()));
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.thumbnails.quality)
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Encoding of persisted thumbnails.
    pub format: OutputFormat,
    /// Default resize mode for the CLI.
    pub mode: ResizeMode,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            mode: ResizeMode::Fill,
            quality: Quality::default().value(),
        }
    }
}

/// In-memory tier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    pub enabled: bool,
    /// Megabytes of decoded pixels the memory tier keeps alive by itself.
    pub budget_mb: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            budget_mb: 256,
        }
    }
}

impl MemoryConfig {
    pub fn budget_bytes(&self) -> usize {
        self.budget_mb.saturating_mul(1024 * 1024)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Parse a config document, validate it, and expand `cache_dir`.
pub fn parse_config(content: &str) -> Result<CacheConfig, ConfigError> {
    let mut config: CacheConfig = toml::from_str(content)?;
    config.cache_dir = expand_home(&config.cache_dir);
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// Returns the stock defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<CacheConfig, ConfigError> {
    if !path.exists() {
        return Ok(CacheConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Default location of the config file: `<config dir>/thumbcache/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("thumbcache").join("config.toml"))
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# thumbcache Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Root directory of the thumbnail cache. Thumbnails are stored in one
# sub-directory per requested size ("<width>_<height>").
# A leading ~/ is expanded to your home directory.
# cache_dir = "~/.thumbcache/thumbnails"

# ---------------------------------------------------------------------------
# Thumbnail generation
# ---------------------------------------------------------------------------
[thumbnails]
# Encoding of stored thumbnails: "png" (lossless, keeps transparency)
# or "jpeg" (smaller, opaque).
format = "png"

# "fit": the whole image fits inside the requested box.
# "fill": the box is covered and the overflow is cropped from the center.
mode = "fill"

# JPEG encoding quality (1 = worst, 100 = best). Ignored for PNG.
quality = 90

# ---------------------------------------------------------------------------
# Memory cache
# ---------------------------------------------------------------------------
[memory]
# Keep decoded thumbnails in memory between requests.
enabled = true

# Megabytes of decoded pixels the memory cache keeps alive on its own.
# Thumbnails still in use elsewhere stay cached beyond this budget.
budget_mb = 256

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers (used by image comparison).
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = CacheConfig::default();
        config.validate().unwrap();
        assert_eq!(config.thumbnails.format, OutputFormat::Png);
        assert_eq!(config.thumbnails.mode, ResizeMode::Fill);
        assert_eq!(config.thumbnails.quality, 90);
        assert!(config.memory.enabled);
        assert_eq!(config.memory.budget_bytes(), 256 * 1024 * 1024);
        assert!(config.cache_dir.ends_with(".thumbcache/thumbnails"));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let parsed = parse_config(stock_config_toml()).unwrap();
        assert_eq!(parsed, CacheConfig::default());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r#"
            [thumbnails]
            format = "jpeg"
            "#,
        )
        .unwrap();
        assert_eq!(config.thumbnails.format, OutputFormat::Jpeg);
        assert_eq!(config.thumbnails.mode, ResizeMode::Fill);
        assert!(config.memory.enabled);
    }

    #[test]
    fn parse_full_config() {
        let config = parse_config(
            r#"
            cache_dir = "/var/cache/thumbs"

            [thumbnails]
            format = "png"
            mode = "fit"
            quality = 75

            [memory]
            enabled = false
            budget_mb = 0

            [processing]
            max_processes = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/thumbs"));
        assert_eq!(config.thumbnails.mode, ResizeMode::Fit);
        assert_eq!(config.quality().value(), 75);
        assert!(!config.memory.enabled);
        assert_eq!(config.processing.max_processes, Some(2));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = parse_config(
            r#"
            [thumbnails]
            sizes = [1, 2]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let result = parse_config("[thumbnails]\nmode = \"stretch\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn quality_out_of_range_fails_validation() {
        let result = parse_config("[thumbnails]\nquality = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        let result = parse_config("[thumbnails]\nquality = 101\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_budget_with_memory_enabled_fails_validation() {
        let result = parse_config("[memory]\nbudget_mb = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn tilde_cache_dir_is_expanded() {
        let config = parse_config("cache_dir = \"~/thumbs\"\n").unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.cache_dir, home.join("thumbs"));
        }
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[memory]\nbudget_mb = 64\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.memory.budget_mb, 64);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(100_000),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
