//! `swarmlink watch` — watcher lifecycle over the control socket.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use swarmlink_core::{data_root_from_env, Config};
use swarmlink_daemon::paths::{socket_path, stderr_log_path, stdout_log_path};
use swarmlink_daemon::{request_status, request_stop, start_blocking, DaemonError};

#[derive(Subcommand, Debug)]
pub enum WatchCommand {
    /// Run the watcher in the foreground.
    Start,
    /// Request graceful watcher shutdown over the Unix socket.
    Stop,
    /// Query watcher runtime status over the Unix socket.
    Status,
    /// Print recent watcher log lines.
    Logs(WatchLogsArgs),
}

#[derive(Args, Debug)]
pub struct WatchLogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,

    /// Show only the stderr log file.
    #[arg(long)]
    pub stderr_only: bool,
}

pub fn run(command: WatchCommand) -> Result<()> {
    match command {
        WatchCommand::Start => {
            let config = Config::from_env().context("incomplete watcher configuration")?;
            start_blocking(config).context("watcher exited with error")?;
        }
        WatchCommand::Stop => {
            let root = data_root_from_env();
            match request_stop(&root) {
                Ok(()) => println!("watcher stop requested"),
                Err(DaemonError::NotRunning { .. }) => println!("watcher is not running"),
                Err(err) => return Err(err).context("failed to stop watcher"),
            }
        }
        WatchCommand::Status => {
            let root = data_root_from_env();
            match request_status(&root) {
                Ok(status) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&status)
                            .context("failed to render watcher status JSON")?
                    );
                }
                Err(DaemonError::NotRunning { .. }) => {
                    let payload = serde_json::json!({
                        "running": false,
                        "socket": socket_path(&root).display().to_string(),
                    });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&payload)
                            .context("failed to render watcher status JSON")?
                    );
                }
                Err(err) => return Err(err).context("failed to query watcher status"),
            }
        }
        WatchCommand::Logs(args) => {
            let root = data_root_from_env();
            if args.stderr_only {
                print_tail(&stderr_log_path(&root), args.lines)
                    .context("failed to read watcher stderr log")?;
            } else {
                print_tail(&stdout_log_path(&root), args.lines)
                    .context("failed to read watcher stdout log")?;
                print_tail(&stderr_log_path(&root), args.lines)
                    .context("failed to read watcher stderr log")?;
            }
        }
    }

    Ok(())
}

fn print_tail(path: &std::path::Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
