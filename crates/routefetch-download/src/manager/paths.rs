//! Destination path planning for downloads.
//!
//! `Copy` downloads write straight into their target file, which doubles as
//! the resume basis. `Extract` downloads stage the archive in a temporary
//! file inside the target directory; the file is deleted when the
//! destination is dropped.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use routefetch_core::download::{Action, DownloadError, DownloadRequest};

/// A planned download destination.
#[derive(Debug)]
pub enum DownloadDestination {
    /// Bytes land directly in the target file.
    File(PathBuf),
    /// Bytes land in a staging file; the target directory receives the
    /// extracted contents.
    Staged {
        dir: PathBuf,
        staging: NamedTempFile,
    },
}

impl DownloadDestination {
    /// Create the destination for a request, creating parent directories.
    pub fn plan(request: &DownloadRequest) -> Result<Self, DownloadError> {
        match request.action {
            Action::Copy => {
                if let Some(parent) = request.target.parent() {
                    ensure_dir(parent)?;
                }
                Ok(Self::File(request.target.clone()))
            }
            Action::Extract => {
                ensure_dir(&request.target)?;
                let staging = tempfile::Builder::new()
                    .prefix(".routefetch-")
                    .suffix(".part")
                    .tempfile_in(&request.target)
                    .map_err(|e| DownloadError::from_io_error(&e))?;
                Ok(Self::Staged {
                    dir: request.target.clone(),
                    staging,
                })
            }
        }
    }

    /// Where transferred bytes are written.
    pub fn write_path(&self) -> &Path {
        match self {
            Self::File(path) => path,
            Self::Staged { staging, .. } => staging.path(),
        }
    }

    /// A previously written file that may already be correct or be resumed.
    ///
    /// Staged destinations never have one.
    pub fn existing_file(&self) -> Option<&Path> {
        match self {
            Self::File(path) if path.is_file() => Some(path),
            _ => None,
        }
    }

    /// Directory receiving extracted contents, for staged destinations.
    pub fn extract_dir(&self) -> Option<&Path> {
        match self {
            Self::File(_) => None,
            Self::Staged { dir, .. } => Some(dir),
        }
    }
}

/// Ensure a directory exists, creating it if necessary.
fn ensure_dir(dir: &Path) -> Result<(), DownloadError> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| DownloadError::io("create_dir", e.to_string()))
}
