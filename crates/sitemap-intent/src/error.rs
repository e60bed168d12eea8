//! Error type shared by every stage of the intent engine.

use std::path::PathBuf;

/// Errors raised by the intent engine.
///
/// The rule classifier never produces one of these: an unmatched slug is a
/// valid `unknown` result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("snapshot I/O failed at {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot at {} is unreadable: {source}", path.display())]
    SnapshotCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot '{id}' already exists for domain '{domain}'")]
    SnapshotExists { domain: String, id: String },

    #[error("tree count mismatch at '{path}': expected {expected}, found {actual}")]
    CountMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("sitemap '{location}' could not be read: {reason}")]
    Sitemap { location: String, reason: String },

    #[error("enrichment failed: {0}")]
    Enrichment(String),

    #[error("export failed: {0}")]
    Export(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a snapshot I/O failure at `path`.
    pub(crate) fn snapshot(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Snapshot {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
