//! Reel CLI - Headless tools for the Reel player
//!
//! Features:
//! - Event code table
//! - HLS/DASH engine detection for URLs
//! - Playlist simulation against the in-memory host
//! - Event message decoding

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Reel CLI - Media event and playlist toolkit
#[derive(Parser)]
#[command(name = "reel-cli")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Media event and playlist toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List event codes and their media element events
    Events,

    /// Show which engine each URL dispatches to
    Detect {
        /// Stream URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Play a playlist on the in-memory host
    Simulate {
        /// Player configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Launch stream URL
        #[arg(long)]
        video: Option<String>,

        /// Playlist entry URL (repeatable)
        #[arg(short, long = "entry")]
        entries: Vec<String>,

        /// Times to loop through the playlist
        #[arg(short = 'n', long, default_value = "1")]
        cycles: usize,

        /// Playlist index whose load fails (repeatable)
        #[arg(long)]
        fail: Vec<usize>,

        /// Event codes to subscribe to, comma separated
        #[arg(short, long, value_delimiter = ',')]
        subscribe: Vec<u32>,

        /// Simulated media duration in seconds
        #[arg(short, long, default_value = "60")]
        duration: f64,
    },

    /// Decode an event message
    Decode {
        /// Message JSON, e.g. '{"readyState":4,"event":6,"message":""}'
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    reel_core::init();

    match cli.command {
        Commands::Events => {
            commands::events(&cli.format)?;
        }
        Commands::Detect { urls } => {
            commands::detect(&urls, &cli.format)?;
        }
        Commands::Simulate { config, video, entries, cycles, fail, subscribe, duration } => {
            let options = commands::SimulateOptions {
                config,
                video,
                entries,
                cycles,
                fail,
                subscribe,
                duration,
            };
            commands::simulate(options, &cli.format).await?;
        }
        Commands::Decode { message } => {
            commands::decode(&message, &cli.format)?;
        }
    }

    Ok(())
}
