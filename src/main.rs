use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tonetrail::config::{AppConfig, AudioBackend};
use tonetrail_core::Language;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default config file looked up in the working directory.
const LOCAL_CONFIG: &str = "tonetrail.toml";

/// A pitch-training game for the terminal
#[derive(Parser, Debug)]
#[command(name = "tonetrail", version, about)]
struct Args {
    /// Configuration file (default: ./tonetrail.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for melody generation, for repeatable sessions
    #[arg(long)]
    seed: Option<u64>,

    /// Audio backend: synth, midi or silent
    #[arg(long)]
    audio: Option<AudioBackend>,

    /// Directory for saved progress
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Melody catalog (TOML) to use instead of the built-in melodies
    #[arg(long)]
    melodies: Option<PathBuf>,

    /// Interface language: en or de
    #[arg(long)]
    language: Option<Language>,
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => path.clone(),
        None => {
            let local = PathBuf::from(LOCAL_CONFIG);
            if !local.is_file() {
                return Ok(AppConfig::default());
            }
            local
        }
    };
    let mut config = AppConfig::load(&path)?;
    if let Some(base) = path.parent() {
        config.resolve_relative_to(base);
    }
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_ref())?;

    if let Some(backend) = args.audio {
        config.audio.backend = backend;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(melodies) = args.melodies {
        config.melodies = Some(melodies);
    }
    if let Some(language) = args.language {
        config.game.language = language;
    }
    if let Some(seed) = args.seed {
        config.game.seed = Some(seed);
    }
    if config.game.seed.is_none() {
        let seed = rand::random::<u64>();
        info!(seed, "generated seed");
        config.game.seed = Some(seed);
    }

    tonetrail::repl::start(config)
}
