//! CLI-specific error types and mappings.
//!
//! Maps engine and settings errors onto exit codes and user-facing messages.

use routefetch_core::{DownloadError, ErrorKind, SettingsError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument or manifest problem.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// Settings from the environment or flags are out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local file problem.
    #[error("IO error: {0}")]
    Io(String),

    /// One or more downloads ended in `Failed`.
    #[error("{failed} of {total} download(s) failed")]
    DownloadsFailed { failed: usize, total: usize },

    /// A local file did not match its expected size or checksum.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Network or other engine failure.
    #[error("{0}")]
    Download(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Specific categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Download(_) | Self::DownloadsFailed { .. } | Self::Verification(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<DownloadError> for CliError {
    fn from(err: DownloadError) -> Self {
        match err.kind() {
            ErrorKind::InvalidRequest => Self::Arguments(err.to_string()),
            ErrorKind::SizeMismatch | ErrorKind::ChecksumMismatch => {
                Self::Verification(err.to_string())
            }
            ErrorKind::Io => Self::Io(err.to_string()),
            _ => Self::Download(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
