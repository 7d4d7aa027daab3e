use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thumbcache::imaging::{self, ImageCodec, OutputFormat, ResizeMode, RustCodec};
use thumbcache::thumbnails::ThumbnailService;
use thumbcache::{config, output};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

fn version_string() -> &'static str {
    let hash = env!("GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{}@{hash}", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "thumbcache")]
#[command(about = "Generate and cache image thumbnails")]
#[command(long_about = "\
Generate and cache image thumbnails

Thumbnails are stored under the cache directory in one folder per size:

  ~/.thumbcache/thumbnails/
  ├── 100_100/
  │   └── <source fingerprint>_fill_100x100_<sha256>.png
  └── 200_200/
      └── ...

A thumbnail is keyed by the source's absolute path, modification time and
size, so editing a photo produces a fresh thumbnail on the next request.

Run 'thumbcache gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: <config dir>/thumbcache/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory (overrides config)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce thumbnails for images or directories of images
    Thumb {
        /// Source images or directories (searched recursively)
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// Thumbnail width
        #[arg(long, default_value_t = 200)]
        width: u32,
        /// Thumbnail height (default: same as width)
        #[arg(long)]
        height: Option<u32>,
        /// fit or fill (default from config)
        #[arg(long)]
        mode: Option<ResizeMode>,
        /// Also write each thumbnail into this directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Only report cached thumbnails; never generate
        #[arg(long)]
        no_create: bool,
    },
    /// Report regions whose brightness differs between two images
    Compare {
        first: PathBuf,
        second: PathBuf,
        /// Merge touching regions
        #[arg(long)]
        merge: bool,
        /// Print regions as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every cached thumbnail
    Clear,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("thumbcache=warn"),
        1 => EnvFilter::new("thumbcache=info"),
        _ => EnvFilter::new("thumbcache=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let settings = || resolve_config(cli.config.as_deref(), cli.cache_dir.as_deref());

    match cli.command {
        Command::Thumb {
            sources,
            width,
            height,
            mode,
            out,
            no_create,
        } => {
            let cache_config = settings()?;
            let height = height.unwrap_or(width);
            let mode = mode.unwrap_or(cache_config.thumbnails.mode);
            let service = ThumbnailService::from_config(&cache_config)?;
            let codec = RustCodec::new(cache_config.quality());
            let format = cache_config.thumbnails.format;
            if let Some(dir) = &out {
                std::fs::create_dir_all(dir)?;
            }

            for source in collect_sources(&sources) {
                let before = service.stats();
                let Some(thumb) = service.get(&source, width, height, mode, !no_create)? else {
                    println!("{}", source.display());
                    println!("    {width}x{height} {mode}: not cached");
                    continue;
                };
                let origin = output::origin_from_stats(&before, &service.stats());

                let saved = match &out {
                    Some(dir) => {
                        let path = dir.join(output_name(&source, width, height, format));
                        std::fs::write(&path, codec.encode(&thumb, format)?)?;
                        Some(path)
                    }
                    None => None,
                };

                output::print_thumb_report(&output::ThumbReport {
                    source: &source,
                    requested: (width, height),
                    mode,
                    produced: thumb.dimensions(),
                    origin,
                    saved_to: saved.as_deref(),
                });
            }
            println!("{}", output::format_stats(&service.stats()));
        }
        Command::Compare {
            first,
            second,
            merge,
            json,
        } => {
            init_thread_pool(&settings()?.processing);
            let codec: Arc<dyn ImageCodec> = Arc::new(RustCodec::default());
            let a = codec.decode_file(&first)?;
            let b = codec.decode_file(&second)?;
            let changes = imaging::operations::compare(&a, &b, merge)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&changes)?);
            } else {
                output::print_compare_output(a.dimensions(), &changes);
            }
        }
        Command::Clear => {
            let cache_config = settings()?;
            let service = ThumbnailService::from_config(&cache_config)?;
            service.clear()?;
            println!("{}", output::format_clear_output(service.root()));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config file (explicit or default location) and apply the
/// `--cache-dir` override.
fn resolve_config(
    path: Option<&Path>,
    cache_dir: Option<&Path>,
) -> Result<config::CacheConfig, config::ConfigError> {
    let mut cache_config = match path.map(Path::to_path_buf).or_else(config::default_config_path) {
        Some(path) => config::load_config(&path)?,
        None => config::CacheConfig::default(),
    };
    if let Some(dir) = cache_dir {
        cache_config.cache_dir = config::expand_home(dir);
    }
    Ok(cache_config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Expand directories into the image files below them, sorted; files are
/// kept as given.
fn collect_sources(sources: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for source in sources {
        if source.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(source)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && imaging::is_image_file(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(source.clone());
        }
    }
    files
}

fn output_name(source: &Path, width: u32, height: u32, format: OutputFormat) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thumbnail".to_string());
    format!("{stem}_{width}x{height}.{}", format.extension())
}
