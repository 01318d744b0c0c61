//! edsync CLI
//!
//! Command-line front end for the edsync settings synchronization engine.
//!
//! # Commands
//!
//! - `sync` - Run one sync cycle now
//! - `watch` - Run the periodic sync loop in the foreground
//! - `status` - Show the local sync baseline (and optionally the server's)
//! - `logout` - Forget the cached auth token

mod auth;
mod commands;
mod http;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// edsync command-line settings synchronization.
#[derive(Parser)]
#[command(name = "edsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the editor configuration directory
    #[arg(global = true, short, long, default_value = ".edsync")]
    config_dir: PathBuf,

    /// Base URL of the settings service
    #[arg(global = true, short, long, default_value = "https://api.edsync.dev")]
    server: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle now
    Sync,

    /// Run the periodic sync loop in the foreground
    Watch {
        /// Seconds between sync cycles
        #[arg(short, long, default_value = "60")]
        interval: u64,
    },

    /// Show the local sync baseline
    Status {
        /// Also fetch the server's info record
        #[arg(short, long)]
        remote: bool,
    },

    /// Forget the cached auth token
    Logout,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sync => commands::sync::run(&cli.config_dir, &cli.server)?,
        Commands::Watch { interval } => {
            commands::watch::run(&cli.config_dir, &cli.server, interval)?
        }
        Commands::Status { remote } => commands::status::run(&cli.config_dir, &cli.server, remote)?,
        Commands::Logout => commands::logout::run(&cli.config_dir)?,
        Commands::Version => {
            println!("edsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
