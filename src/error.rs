//! Error types for ncmdump-sync
//!
//! This module provides the error taxonomy for the library:
//! - [`Error`] for operations that fail as a whole (config, network, install, run gating)
//! - [`InstallError`] for the individual stages of an artifact install
//! - [`ConvertError`] for per-item conversion failures, which never abort a batch

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ncmdump-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ncmdump-sync
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "install_dir")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level HTTP error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The release index answered, but not with something usable
    #[error("release index error: {0}")]
    ReleaseIndex(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Artifact install failed
    #[error("install error: {0}")]
    Install(#[from] InstallError),

    /// No usable native library is installed
    #[error("native library is not available; check the network and restart the update")]
    CapabilityUnavailable,

    /// A batch run or update check is already in progress
    #[error("another operation is already in progress")]
    AlreadyRunning,

    /// Path or item not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Whether this error belongs to the "could not reach the release index" class
    ///
    /// The update coordinator falls back to a local binary for these.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::ReleaseIndex(_))
    }
}

/// Failures of the individual install stages
#[derive(Debug, Error)]
pub enum InstallError {
    /// Archive download failed
    #[error("download of {url} failed: {reason}")]
    Download {
        /// The asset URL
        url: String,
        /// The reason the download failed
        reason: String,
    },

    /// The downloaded file could not be read as a zip archive
    #[error("extraction failed for {archive}: {reason}")]
    Extraction {
        /// The temporary archive path
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// The archive does not contain the expected binary
    #[error("archive does not contain {entry}")]
    EntryMissing {
        /// The expected entry name
        entry: String,
    },

    /// The extracted binary failed the sanity check
    #[error("downloaded binary is corrupt: {reason}")]
    Validation {
        /// Why the binary was rejected
        reason: String,
    },

    /// Replacing the active binary or writing the marker failed
    #[error("failed to commit {path}: {reason}")]
    Commit {
        /// The destination being written
        path: PathBuf,
        /// The reason the commit failed
        reason: String,
    },
}

/// Per-item conversion failure
///
/// These are reported through the item's status and log line; none of them stop a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// The input file does not exist
    #[error("input file does not exist: {path}")]
    InputMissing {
        /// The missing input path
        path: PathBuf,
    },

    /// The native library is not installed
    #[error("native library is missing; restart to download it again")]
    CapabilityMissing,

    /// The output directory does not exist and could not be created
    #[error("cannot create output directory {path}: {reason}")]
    OutputDir {
        /// The output directory
        path: PathBuf,
        /// The reason creation failed
        reason: String,
    },

    /// The native transform reported failure or blew up
    #[error("conversion failed{}: {reason}", code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    TransformFailed {
        /// Result code returned by the native library, if it got that far
        code: Option<i32>,
        /// Description of the failure
        reason: String,
    },
}
