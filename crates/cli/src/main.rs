use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gondola_core::GondolaConfig;

mod commands;

/// Read barcode, price, weight and product name from shelf-label photos.
#[derive(Parser)]
#[command(name = "gondola")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract from one or more image files
    Extract(commands::ExtractArgs),

    /// Extract from every jpg/jpeg/png under a folder
    Scan(commands::ScanArgs),

    /// Extract from images as they are dropped into a folder
    Watch(commands::WatchArgs),

    /// Show the product vocabulary or look up a name in it
    Vocab(commands::VocabArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v. Logs go to stderr so stdout stays machine-readable.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => GondolaConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GondolaConfig::default(),
    };

    match cli.command {
        Commands::Extract(args) => commands::extract(args, &config).await,
        Commands::Scan(args) => commands::scan(args, &config).await,
        Commands::Watch(args) => commands::watch(args, &config).await,
        Commands::Vocab(args) => commands::vocab(args, &config),
    }
}
