//! Download error types.
//!
//! These errors are serializable and never hold external error types like
//! `std::io::Error`. For I/O errors we capture the kind and message as strings,
//! so an observer can inspect a failed download's error after the fact.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::state::DownloadState;

/// Flat discriminant of [`DownloadError`] for observers that only need the category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Transport,
    HttpStatus,
    SizeMismatch,
    ChecksumMismatch,
    Extraction,
    Cancelled,
    InvalidRequest,
    QueueFull,
    Io,
    InvalidTransition,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Transport => "transport",
            Self::HttpStatus => "http_status",
            Self::SizeMismatch => "size_mismatch",
            Self::ChecksumMismatch => "checksum_mismatch",
            Self::Extraction => "extraction",
            Self::Cancelled => "cancelled",
            Self::InvalidRequest => "invalid_request",
            Self::QueueFull => "queue_full",
            Self::Io => "io",
            Self::InvalidTransition => "invalid_transition",
        };
        f.write_str(name)
    }
}

/// Error type for download operations.
///
/// Every variant is terminal for the current attempt: the download lands in
/// `Failed` with the error attached.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// DNS failure, refused connection, or timeout before any bytes arrived.
    #[error("Connection error: {message}")]
    Connection {
        /// Detailed error message.
        message: String,
    },

    /// The response stream broke after the transfer started.
    #[error("Transport error after {bytes_written} bytes: {message}")]
    Transport {
        /// Detailed error message.
        message: String,
        /// Bytes written to the target before the stream broke.
        bytes_written: u64,
    },

    /// The server answered with a status that carries no usable body.
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Reason phrase or body excerpt.
        message: String,
    },

    /// The written file does not have the expected length.
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Expected byte count.
        expected: u64,
        /// Actual byte count on disk.
        actual: u64,
    },

    /// The written file does not have the expected digest.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Expected hex digest, as supplied by the caller.
        expected: String,
        /// Computed lowercase hex digest.
        actual: String,
    },

    /// Corrupt archive, path traversal, or disk I/O during expansion.
    #[error("Extraction failed: {message}")]
    Extraction {
        /// Detailed error message.
        message: String,
    },

    /// The download was interrupted by shutdown.
    #[error("Download cancelled: {reason}")]
    Cancelled {
        /// Why the download was cancelled.
        reason: String,
    },

    /// The request was malformed and never reached a worker.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What is wrong with the request.
        message: String,
    },

    /// Queue is full, cannot admit more downloads.
    #[error("Queue full: maximum {max_size} pending downloads allowed")]
    QueueFull {
        /// Maximum number of pending downloads.
        max_size: u32,
    },

    /// I/O error during local file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "`NotFound`", "`PermissionDenied`").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// A component attempted an edge that is not in the state graph.
    #[error("Illegal state transition {from} -> {to}")]
    InvalidTransition {
        /// State before the attempted transition.
        from: DownloadState,
        /// Rejected target state.
        to: DownloadState,
    },
}

impl DownloadError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>, bytes_written: u64) -> Self {
        Self::Transport {
            message: message.into(),
            bytes_written,
        }
    }

    /// Create an HTTP status error.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            message: message.into(),
        }
    }

    /// Create a size mismatch error.
    #[must_use]
    pub const fn size_mismatch(expected: u64, actual: u64) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ChecksumMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an extraction error.
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a queue full error.
    #[must_use]
    pub const fn queue_full(max_size: u32) -> Self {
        Self::QueueFull { max_size }
    }

    /// Create an I/O error from kind and message strings.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create an invalid transition error.
    #[must_use]
    pub const fn invalid_transition(from: DownloadState, to: DownloadState) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// The flat category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::QueueFull { .. } => ErrorKind::QueueFull,
            Self::Io { .. } => ErrorKind::Io,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        }
    }

    /// Whether partial bytes left on disk are a meaningful basis for a later resume.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Cancelled { .. } | Self::Io { .. }
        )
    }

    /// Whether the target must be discarded because its content is known to be wrong.
    #[must_use]
    pub const fn discards_partial(&self) -> bool {
        matches!(
            self,
            Self::SizeMismatch { .. } | Self::ChecksumMismatch { .. }
        )
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection { message } => format!("Could not connect: {message}"),
            Self::Transport { bytes_written, .. } => {
                format!("Connection dropped after {bytes_written} bytes. Queue it again to resume.")
            }
            Self::HttpStatus { status, message } => format!("Server answered HTTP {status}: {message}"),
            Self::SizeMismatch { expected, actual } => {
                format!("Downloaded {actual} bytes but expected {expected}. The file was discarded.")
            }
            Self::ChecksumMismatch { .. } => {
                "Checksum verification failed. The file was discarded.".to_string()
            }
            Self::Extraction { message } => format!("Could not unpack archive: {message}"),
            Self::Cancelled { reason } => format!("Cancelled ({reason})."),
            Self::InvalidRequest { message } => format!("Request rejected: {message}"),
            Self::QueueFull { max_size } => {
                format!("Download queue is full (max {max_size} items). Wait for a download to finish.")
            }
            Self::Io { message, .. } => format!("File operation failed: {message}"),
            Self::InvalidTransition { from, to } => format!("Internal error: {from} -> {to}"),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// Convenience result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = DownloadError::from_io_error(&io_err);

        match err {
            DownloadError::Io { kind, message } => {
                assert_eq!(kind, "NotFound");
                assert!(message.contains("file not found"));
            }
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_error_serialization() {
        let err = DownloadError::http_status(404, "Not Found");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("404"));

        let parsed: DownloadError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(DownloadError::connection("refused").kind(), ErrorKind::Connection);
        assert_eq!(DownloadError::size_mismatch(1, 2).kind(), ErrorKind::SizeMismatch);
        assert_eq!(DownloadError::cancelled("dispose").kind(), ErrorKind::Cancelled);
        assert_eq!(ErrorKind::ChecksumMismatch.to_string(), "checksum_mismatch");
    }

    #[test]
    fn test_resumable_vs_discarding() {
        assert!(DownloadError::transport("reset", 10).is_resumable());
        assert!(DownloadError::cancelled("dispose").is_resumable());
        assert!(!DownloadError::checksum_mismatch("a", "b").is_resumable());
        assert!(DownloadError::checksum_mismatch("a", "b").discards_partial());
        assert!(DownloadError::size_mismatch(10, 9).discards_partial());
        assert!(!DownloadError::http_status(500, "boom").discards_partial());
    }

    #[test]
    fn test_user_messages() {
        let err = DownloadError::queue_full(5);
        assert!(err.user_message().contains('5'));
        assert!(err.user_message().contains("full"));
    }
}
