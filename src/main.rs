use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{debug, error, info};

use trackthumb::config::{load_config_file, user_config_path};
use trackthumb::{FontSet, ThumbnailCache, ThumbnailConfig, TrackDescriptor};

#[derive(Parser)]
#[command(name = "trackthumb")]
#[command(version)]
#[command(about = "Render (or reuse) the now-playing card for one track")]
struct Cli {
    /// Path to the config TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stable track identifier, used as the artifact file name
    #[arg(long)]
    track_id: String,

    /// Track title
    #[arg(long)]
    name: String,

    #[arg(long)]
    artist: Option<String>,

    /// Duration in seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Cover-art URL
    #[arg(long)]
    thumbnail: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> ThumbnailConfig {
    if let Some(path) = &cli.config {
        return load_config_file(path);
    }
    match user_config_path() {
        Some(path) if path.exists() => load_config_file(&path),
        _ => {
            debug!("No config file found. Using defaults");
            ThumbnailConfig::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config = load_config(&cli);
    let fonts = match FontSet::load(&config.fonts) {
        Ok(fonts) => fonts,
        Err(err) => {
            error!("Failed to load fonts: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let cache = ThumbnailCache::from_config(&config, Arc::new(fonts));
    info!("Using thumbnail cache at {}", cache.cache_dir().display());
    let track = TrackDescriptor {
        track_id: cli.track_id,
        name: cli.name,
        artist: cli.artist,
        duration: cli.duration,
        thumbnail: cli.thumbnail,
    };

    let path = cache.get_or_generate(&track).await;
    if path.is_empty() {
        return ExitCode::FAILURE;
    }
    println!("{path}");
    ExitCode::SUCCESS
}
