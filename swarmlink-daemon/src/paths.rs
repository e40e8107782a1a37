//! Runtime paths and tuning constants.
//!
//! Everything the watcher writes at runtime (socket, logs) lives under
//! `<data_root>/.swarmlink/`, next to the watched `data/` tree.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Repeat OS events for the same path within this window coalesce.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Spacing between the stability detector's two size samples.
pub const STABILITY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Minimum spacing between consecutive notification sends.
pub const MIN_NOTIFY_SPACING: Duration = Duration::from_secs(3);

/// How long shutdown waits for the in-flight dispatch to finish.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub const WATCHER_SOCKET: &str = "watcher.sock";
pub const WATCHER_STDOUT_LOG: &str = "watcher.log";
pub const WATCHER_STDERR_LOG: &str = "watcher-err.log";

pub fn runtime_root(root: &Path) -> PathBuf {
    root.join(".swarmlink")
}

pub fn run_dir(root: &Path) -> PathBuf {
    runtime_root(root).join("run")
}

pub fn socket_path(root: &Path) -> PathBuf {
    run_dir(root).join(WATCHER_SOCKET)
}

pub fn logs_dir(root: &Path) -> PathBuf {
    runtime_root(root).join("logs")
}

pub fn stdout_log_path(root: &Path) -> PathBuf {
    logs_dir(root).join(WATCHER_STDOUT_LOG)
}

pub fn stderr_log_path(root: &Path) -> PathBuf {
    logs_dir(root).join(WATCHER_STDERR_LOG)
}
