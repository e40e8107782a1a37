//! Error types for swarmlink-sync.

use thiserror::Error;

use swarmlink_core::CoreError;

/// All errors that can arise from sink adapters and recipient resolution.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level HTTP failure (DNS, connect, TLS, timeout).
    #[error("HTTP transport error during {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<ureq::Transport>,
    },

    /// The remote API answered with a non-success status.
    #[error("remote API returned {status} during {context}: {body}")]
    Api {
        status: u16,
        context: String,
        body: String,
    },

    /// An external VCS command failed.
    #[error("git {op} failed: {detail}")]
    Vcs { op: &'static str, detail: String },
}

impl SyncError {
    /// Whether a retry with backoff can plausibly succeed.
    ///
    /// Transport errors, server-side errors, and rate limiting are
    /// transient; malformed payloads and client-side API errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { .. } | SyncError::Vcs { .. } => true,
            SyncError::Api { status, .. } => *status == 429 || *status >= 500,
            SyncError::Core(_) | SyncError::Json(_) | SyncError::Io(_) => false,
        }
    }
}

/// Convert a `ureq` call result error into our taxonomy, tagging it with
/// the request context for the logs.
pub(crate) fn http_err(context: impl Into<String>, err: ureq::Error) -> SyncError {
    let context = context.into();
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            SyncError::Api {
                status,
                context,
                body,
            }
        }
        ureq::Error::Transport(transport) => SyncError::Transport {
            context,
            source: Box::new(transport),
        },
    }
}
