//! Mountlog CLI - mountlog command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod cmd;

/// Mountlog - change journal for virtual checkouts
#[derive(Parser)]
#[command(name = "mountlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines driver trace and print the journaled changes
    Replay {
        /// Trace file
        trace: PathBuf,
        /// Report changes since this mark (default: since the first mount)
        #[arg(long, conflicts_with = "since")]
        mark: Option<String>,
        /// Report changes since this hex position token
        #[arg(long)]
        since: Option<String>,
    },
    /// Show the effective configuration
    Config,
    /// Decode a hex position token
    Decode {
        /// Position token
        token: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay { trace, mark, since } => {
            cmd::replay::run(&trace, cli.config.as_deref(), mark, since)
        }
        Commands::Config => cmd::config::run(cli.config.as_deref()),
        Commands::Decode { token } => cmd::decode::run(&token),
    }
}
