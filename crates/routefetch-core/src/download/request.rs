//! Download requests and their synchronous validation.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use url::Url;

use super::errors::DownloadError;
use super::types::{Action, DigestAlgorithm};

/// Request to queue a new download.
///
/// This is a pure data structure; nothing here touches the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Human label, opaque to the engine.
    pub description: String,
    /// Source location (absolute http or https URL).
    pub url: String,
    /// Expected size in bytes; `None` skips the size check.
    pub expected_size: Option<u64>,
    /// Expected hex digest; `None` skips the checksum check.
    pub expected_checksum: Option<String>,
    /// Digest algorithm override; `None` uses the manager's default.
    pub checksum_algorithm: Option<DigestAlgorithm>,
    /// What to do with the verified bytes.
    pub action: Action,
    /// Destination file (`Copy`) or directory (`Extract`).
    pub target: PathBuf,
}

impl DownloadRequest {
    /// Create a new request with required fields; size and checksum are unchecked.
    pub fn new(
        description: impl Into<String>,
        url: impl Into<String>,
        target: impl Into<PathBuf>,
    ) -> Self {
        Self {
            description: description.into(),
            url: url.into(),
            expected_size: None,
            expected_checksum: None,
            checksum_algorithm: None,
            action: Action::Copy,
            target: target.into(),
        }
    }

    /// Set the expected size.
    #[must_use]
    pub const fn with_expected_size(mut self, size: Option<u64>) -> Self {
        self.expected_size = size;
        self
    }

    /// Set the expected checksum.
    #[must_use]
    pub fn with_expected_checksum(mut self, checksum: Option<String>) -> Self {
        self.expected_checksum = checksum;
        self
    }

    /// Override the digest algorithm.
    #[must_use]
    pub const fn with_checksum_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.checksum_algorithm = Some(algorithm);
        self
    }

    /// Set the post-processing action.
    #[must_use]
    pub const fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Whether size or checksum gives the transfer something to verify against.
    #[must_use]
    pub const fn has_verification(&self) -> bool {
        self.expected_size.is_some() || self.expected_checksum.is_some()
    }

    /// Target path with `.` components dropped and `..` folded, for
    /// comparing two requests' targets without touching the filesystem.
    #[must_use]
    pub fn normalized_target(&self) -> PathBuf {
        normalize_path(&self.target)
    }

    /// Validate the request, returning the parsed URL.
    ///
    /// Rejects what can be known to be wrong without network I/O. A checksum
    /// that is not valid hex is accepted here; it simply never matches.
    pub fn validate(&self) -> Result<Url, DownloadError> {
        if self.target.as_os_str().is_empty() {
            return Err(DownloadError::invalid_request("target path is empty"));
        }

        let url = Url::parse(self.url.trim()).map_err(|e| {
            DownloadError::invalid_request(format!("invalid URL '{}': {e}", self.url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_request(format!(
                "unsupported URL scheme '{}'",
                url.scheme()
            )));
        }

        match self.action {
            Action::Copy if self.target.is_dir() => Err(DownloadError::invalid_request(format!(
                "copy target {} is a directory",
                self.target.display()
            ))),
            Action::Extract if self.target.exists() && !self.target.is_dir() => {
                Err(DownloadError::invalid_request(format!(
                    "extract target {} is not a directory",
                    self.target.display()
                )))
            }
            _ => Ok(url),
        }
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
