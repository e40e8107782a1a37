//! Stability detection: has a file finished being written?
//!
//! Editors and generators produce several OS events per logical write, and a
//! half-written JSON file must never reach a sink. Sampling the byte size
//! twice per probe — and requiring the content to parse — is the cheapest
//! race-free proxy for "write completed" that does not depend on
//! OS-specific atomic-rename semantics.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;

/// Probe `path` until two size samples `poll_interval` apart are equal,
/// non-zero, and the content parses as JSON, or until `timeout` elapses.
///
/// Returns `false` on timeout or any I/O failure; callers skip and log such
/// events rather than propagate them.
pub async fn is_stable(path: &Path, timeout: Duration, poll_interval: Duration) -> bool {
    let deadline = Instant::now() + timeout;

    loop {
        let first = sample_size(path).await;
        tokio::time::sleep(poll_interval).await;
        let second = sample_size(path).await;

        if let (Some(a), Some(b)) = (first, second) {
            if a == b && a > 0 && parses_as_json(path).await {
                return true;
            }
        }

        if Instant::now() >= deadline {
            return false;
        }
    }
}

async fn sample_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|meta| meta.len())
}

async fn parses_as_json(path: &Path) -> bool {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice::<serde_json::Value>(&bytes).is_ok(),
        Err(_) => false,
    }
}
