//! Size-based rotation for the watcher log files.
//!
//! Rotates `watcher.log` and `watcher-err.log` once they exceed 10 MiB,
//! keeping at most 5 numbered backups:
//!   watcher.log → watcher.log.1 → … → watcher.log.5

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::paths::{stderr_log_path, stdout_log_path};

/// Rotation threshold (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Numbered backups kept per log file.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` if its size is at or above `max_bytes`.
///
/// Returns `true` if a rotation happened. Missing files are not an error;
/// the caller treats them as "nothing to rotate".
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }

    fs::rename(log_path, numbered_path(log_path, 1))?;
    fs::write(log_path, b"")?;
    Ok(true)
}

/// Rotate both watcher log files under `<root>/.swarmlink/logs/`, logging
/// (but not propagating) failures so rotation can never take down the loop.
pub fn rotate_logs(root: &Path) {
    for path in [stdout_log_path(root), stderr_log_path(root)] {
        if let Err(err) = rotate_if_needed(&path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
            tracing::warn!(path = %path.display(), error = %err, "log rotation failed");
        }
    }
}

fn numbered_path(log_path: &Path, n: usize) -> PathBuf {
    PathBuf::from(format!("{}.{n}", log_path.display()))
}
