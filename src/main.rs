// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use livecast::Config;

mod cli;

#[derive(Parser)]
#[command(name = "livecast")]
#[command(about = "Broadcast session manager: capture, toggles, recovery")]
#[command(version = env!("LIVECAST_BUILD_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective constraint cascade
    Tiers,

    /// Show the config file path and effective settings
    Config {
        /// Write the effective settings to the config file
        #[arg(long)]
        write: bool,
    },

    /// Classify a YouTube or Twitch stream URL
    ParseUrl {
        /// Stream URL
        url: String,
    },

    /// Run a scripted broadcast session against the simulated device
    Simulate(cli::SimulateArgs),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=livecast=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Commands::Tiers => cli::print_tiers(&config),
        Commands::Config { write } => cli::print_config(&config, write),
        Commands::ParseUrl { url } => cli::parse_url(&url),
        Commands::Simulate(args) => cli::simulate(config, args),
    }
}
