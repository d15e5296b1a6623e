//! Error types shared by the filter core, the record store and the CLI.
//!
//! Planning-phase failures (bad parameters, an unreadable source) surface
//! synchronously from [`crate::filter::filter_by_type`]. Once workers are
//! running, nothing is reported as an error: malformed rows are skipped and
//! never become a `FilterError`.
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for filter and store operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors that can occur while filtering or managing records
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },
    #[error("Record not found: {0}")]
    RecordNotFound(i64),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Enrichment failed for record {id}: {reason}")]
    Enrichment { id: i64, reason: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl FilterError {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn malformed_record(line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn enrichment(id: i64, reason: impl Into<String>) -> Self {
        Self::Enrichment {
            id,
            reason: reason.into(),
        }
    }

    /// Maps an `io::Error` raised while touching `path` onto the most
    /// specific variant.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::file_not_found(path),
            io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// True for the variants that make up the I/O failure class: the source
    /// could not be opened, stat'd, read or mapped.
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::PermissionDenied(_) | Self::IoError(_)
        )
    }
}

impl From<config::ConfigError> for FilterError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
