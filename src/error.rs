//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for daybook operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while indexing or querying notes.
#[derive(Error, Debug)]
pub enum Error {
    /// A note file has a metadata block that cannot be parsed.
    #[error("malformed note {}: {reason}", path.display())]
    MalformedNote { path: PathBuf, reason: String },

    /// The underlying SQLite store failed.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// The filesystem watch could not be established.
    #[error("watch unavailable: {0}")]
    WatchUnavailable(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error tied to a specific path.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A full rebuild stopped part way through.
    #[error("rebuild failed after {processed} notes: {source}")]
    Rebuild {
        processed: usize,
        #[source]
        source: sqlx::Error,
    },
}

impl Error {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::MalformedNote {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
