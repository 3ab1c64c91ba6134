use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::HostStatus;

#[derive(Error, Debug)]
pub enum LogFilesError {
    /// Range or enum violation, detected before any I/O.
    #[error("{0}")]
    InvalidParameter(String),

    /// The directory holding the target is not readable.
    #[error("Path {} permission denied", .0.display())]
    PathUnreadable(PathBuf),

    /// The target is absent although its directory is readable.
    #[error("File {} not found", .0.display())]
    FileNotFound(PathBuf),

    #[error("host {host} unreachable: {reason}")]
    HostUnreachable { host: String, reason: String },

    #[error("internal failure: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LogFilesError>;

impl LogFilesError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub fn unreachable(host: impl Into<String>, reason: impl ToString) -> Self {
        Self::HostUnreachable {
            host: host.into(),
            reason: reason.to_string(),
        }
    }

    pub fn status(&self) -> HostStatus {
        match self {
            Self::InvalidParameter(_) => HostStatus::BadRequest,
            Self::PathUnreadable(_) => HostStatus::Forbidden,
            Self::FileNotFound(_) => HostStatus::NotFound,
            Self::HostUnreachable { .. } => HostStatus::GatewayTimeout,
            Self::Internal(_) => HostStatus::InternalServerError,
        }
    }
}

/// Turns an I/O failure on `path` into a typed error.
///
/// The I/O error alone cannot tell "file missing" apart from "containing
/// directory not readable", so the directory is probed separately.
pub fn classify_io_error(directory: &Path, path: &Path, err: &io::Error) -> LogFilesError {
    if !directory_readable(directory) {
        return LogFilesError::PathUnreadable(directory.to_path_buf());
    }
    tracing::debug!(path = %path.display(), error = %err, "file read failed");
    LogFilesError::FileNotFound(path.to_path_buf())
}

pub(crate) fn directory_readable(directory: &Path) -> bool {
    std::fs::read_dir(directory).is_ok()
}
