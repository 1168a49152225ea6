// File: src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong between reading a corpus and printing a report.
#[derive(Debug, Error)]
pub enum NormError {
    /// A row with the wrong number of columns, an empty required field or an
    /// unknown strategy code. `location` names the file and 1-based line.
    #[error("malformed record at {location}: {reason}")]
    MalformedRecord { location: String, reason: String },

    #[error("no normalization model loaded; build one from training data first")]
    EmptyModel,

    #[error("length mismatch in {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("input file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model snapshot error: {0}")]
    Snapshot(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl NormError {
    pub fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        NormError::MalformedRecord {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NormError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, NormError>;
