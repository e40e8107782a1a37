//! Error types for swarmlink-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Category;

/// All errors that can arise from record parsing, the local store, and
/// configuration loading.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization error without file context.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse error on load — includes the offending file path.
    #[error("failed to parse record at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The category's identifier field was absent, empty, or not a string.
    #[error("{category} record is missing its identifier field '{field}'")]
    MissingIdentifier {
        category: Category,
        field: &'static str,
    },

    /// A required environment variable was not set.
    #[error("required environment variable {name} is not set")]
    ConfigVar { name: &'static str },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
