//! Statwatch CLI - statwatch command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod util;

/// Statwatch - Polling file and directory change monitor
#[derive(Parser)]
#[command(name = "statwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch paths and print changes until interrupted
    Watch {
        /// Files or directories to watch
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Delay between polls in milliseconds (default: 1000)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Also report changes below watched directories
        #[arg(short, long)]
        recursive: bool,

        /// Paths checked before pausing one delay; 0 disables the pause
        #[arg(long)]
        checks_per_run: Option<usize>,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Capture and print the current state of a path
    Snapshot {
        /// File or directory to capture
        path: PathBuf,

        /// Include everything below a directory
        #[arg(short, long)]
        recursive: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = util::init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Watch {
            paths,
            delay_ms,
            recursive,
            checks_per_run,
            config,
            json,
        } => {
            let args = cmd::watch::WatchArgs {
                paths,
                delay_ms,
                recursive,
                checks_per_run,
                config,
                json,
            };
            cmd::watch::run(args).await
        }
        Commands::Snapshot { path, recursive, json } => cmd::snapshot::run(&path, recursive, json),
    }
}
