//! Swarmlink — swarm record synchronization CLI.
//!
//! # Usage
//!
//! ```text
//! swarmlink watch start|stop|status|logs
//! swarmlink pull [--category <dir>]
//! swarmlink push [--category <dir>] [--dry-run]
//! ```
//!
//! The data root comes from `SWARMLINK_DATA_ROOT` (default: the current
//! directory); remote and bot credentials come from the environment or a
//! `.env` file next to the data tree.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{pull::PullArgs, push::PushArgs, watch::WatchCommand};

#[derive(Parser, Debug)]
#[command(
    name = "swarmlink",
    version,
    about = "Watch a swarm record tree and fan changes out to store, VCS, and chat",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the background watcher.
    Watch {
        #[command(subcommand)]
        command: WatchCommand,
    },

    /// Download all remote records into the local tree.
    Pull(PullArgs),

    /// Upsert all local records into the remote store.
    Push(PushArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Watch { command } => commands::watch::run(command),
        Commands::Pull(args) => args.run(),
        Commands::Push(args) => args.run(),
    }
}
