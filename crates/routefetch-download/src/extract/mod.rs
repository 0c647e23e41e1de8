//! Zip archive extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use routefetch_core::download::DownloadError;
use tokio_util::sync::CancellationToken;

use crate::executor::DISPOSED_REASON;

/// Expands zip archives into a destination directory.
#[derive(Debug, Clone, Default)]
pub struct ArchiveExtractor {
    cancel: CancellationToken,
}

impl ArchiveExtractor {
    pub const fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Extract every entry of `archive` below `dest`.
    ///
    /// Intermediate directories are created as needed. An entry whose name
    /// would resolve outside `dest` fails the whole extraction. Returns the
    /// paths of the extracted files in archive order.
    ///
    /// Cancellation returns at once; entries already written stay on disk
    /// and the blocking thread stops before the next entry.
    pub async fn extract(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, DownloadError> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        let cancel = self.cancel.clone();
        let task = tokio::task::spawn_blocking(move || extract_blocking(&archive, &dest, &cancel));

        let joined = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(DownloadError::cancelled(DISPOSED_REASON)),
            joined = task => joined,
        };
        joined.map_err(|e| DownloadError::extraction(format!("extraction task failed: {e}")))?
    }
}

fn extract_blocking(
    archive_path: &Path,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, DownloadError> {
    let file = File::open(archive_path).map_err(|e| extraction_io("open", archive_path, &e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| DownloadError::extraction(format!("not a readable zip archive: {e}")))?;

    fs::create_dir_all(dest).map_err(|e| extraction_io("create destination", dest, &e))?;

    let mut extracted = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        if cancel.is_cancelled() {
            return Err(DownloadError::cancelled(DISPOSED_REASON));
        }
        let mut entry = archive
            .by_index(i)
            .map_err(|e| DownloadError::extraction(format!("failed to read entry {i}: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(DownloadError::extraction(format!(
                "entry '{}' escapes the destination directory",
                entry.name()
            )));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| extraction_io("create directory", &out_path, &e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| extraction_io("create directory", parent, &e))?;
        }

        let mut out = File::create(&out_path).map_err(|e| extraction_io("create", &out_path, &e))?;
        io::copy(&mut entry, &mut out).map_err(|e| extraction_io("write", &out_path, &e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))
                .map_err(|e| extraction_io("set permissions on", &out_path, &e))?;
        }

        tracing::trace!(target: "routefetch.download", path = %out_path.display(), "Extracted entry");
        extracted.push(out_path);
    }

    Ok(extracted)
}

fn extraction_io(action: &str, path: &Path, err: &io::Error) -> DownloadError {
    DownloadError::extraction(format!("failed to {action} {}: {err}", path.display()))
}
