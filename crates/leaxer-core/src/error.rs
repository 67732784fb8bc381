//! Error types for the Leaxer launcher core.
//!
//! Only [`LeaxerError::Spawn`] is meant to reach an end user. Probe and
//! settings errors are recovered inside the resolver and surface as log
//! warnings at most.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the launcher core.
#[derive(Debug, Error)]
pub enum LeaxerError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Process creation
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // Hardware detection
    #[error("Probe {probe} failed: {message}")]
    ProbeFailed { probe: String, message: String },

    #[error("Command `{command}` timed out after {timeout:?}")]
    ProbeTimeout { command: String, timeout: Duration },

    // Settings collaborator
    #[error("Settings error: {message}")]
    Settings { message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for launcher core operations.
pub type Result<T> = std::result::Result<T, LeaxerError>;

impl From<std::io::Error> for LeaxerError {
    fn from(err: std::io::Error) -> Self {
        LeaxerError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LeaxerError {
    fn from(err: serde_json::Error) -> Self {
        LeaxerError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl LeaxerError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        LeaxerError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a probe failure.
    pub fn probe(probe: impl Into<String>, message: impl Into<String>) -> Self {
        LeaxerError::ProbeFailed {
            probe: probe.into(),
            message: message.into(),
        }
    }

    /// Whether the caller has no local recovery for this error.
    ///
    /// Process creation is the only such condition; everything else degrades
    /// to a CPU-only path.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LeaxerError::Spawn { .. })
    }
}
