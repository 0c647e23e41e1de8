//! Integrity checks against expected size and digest.
//!
//! Digests are computed from the bytes on disk, never from the in-flight
//! network stream, so a bad write is caught as well as a bad transfer.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use routefetch_core::download::{DigestAlgorithm, DownloadError};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use tokio_util::sync::CancellationToken;

use crate::executor::DISPOSED_REASON;

/// Read block size for hashing.
const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Size and checksum verification for one algorithm.
///
/// Hashing stops between blocks once the attached token is cancelled.
#[derive(Debug, Clone, Default)]
pub struct ChecksumVerifier {
    algorithm: DigestAlgorithm,
    cancel: CancellationToken,
}

impl ChecksumVerifier {
    /// Create a verifier for `algorithm`.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort hashing when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Pick the algorithm for a request.
    ///
    /// An explicit choice wins; otherwise the hex length of the expected
    /// checksum decides; otherwise `fallback` is used.
    pub fn for_request(
        explicit: Option<DigestAlgorithm>,
        expected_checksum: Option<&str>,
        fallback: DigestAlgorithm,
    ) -> Self {
        let algorithm = explicit
            .or_else(|| expected_checksum.and_then(DigestAlgorithm::from_hex_len))
            .unwrap_or(fallback);
        Self::new(algorithm)
    }

    /// The algorithm in use.
    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Compute the lowercase hex digest of a file in one streaming pass.
    ///
    /// Hashing runs on the blocking pool. Cancellation returns at once; the
    /// blocking thread notices it before reading its next block.
    pub async fn digest_file(&self, path: &Path) -> Result<String, DownloadError> {
        let path: PathBuf = path.to_path_buf();
        let algorithm = self.algorithm;
        let cancel = self.cancel.clone();
        let task = tokio::task::spawn_blocking(move || -> std::io::Result<Option<String>> {
            let file = File::open(&path)?;
            match algorithm {
                DigestAlgorithm::Sha1 => hash_reader::<Sha1>(file, &cancel),
                DigestAlgorithm::Sha256 => hash_reader::<Sha256>(file, &cancel),
                DigestAlgorithm::Sha512 => hash_reader::<Sha512>(file, &cancel),
            }
        });

        let joined = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(DownloadError::cancelled(DISPOSED_REASON)),
            joined = task => joined,
        };
        joined
            .map_err(|e| DownloadError::io("join", format!("hashing task failed: {e}")))?
            .map_err(|e| DownloadError::from_io_error(&e))?
            .ok_or_else(|| DownloadError::cancelled(DISPOSED_REASON))
    }

    /// Case-insensitive comparison of two hex digests.
    pub fn matches(expected: &str, actual: &str) -> bool {
        expected.trim().eq_ignore_ascii_case(actual.trim())
    }

    /// Check a completed file. Size is checked first, then the digest.
    pub async fn verify(
        &self,
        path: &Path,
        expected_size: Option<u64>,
        expected_checksum: Option<&str>,
    ) -> Result<(), DownloadError> {
        if let Some(expected) = expected_size {
            let actual = tokio::fs::metadata(path)
                .await
                .map_err(|e| DownloadError::from_io_error(&e))?
                .len();
            if actual != expected {
                return Err(DownloadError::size_mismatch(expected, actual));
            }
        }

        if let Some(expected) = expected_checksum {
            let actual = self.digest_file(path).await?;
            if !Self::matches(expected, &actual) {
                return Err(DownloadError::checksum_mismatch(expected, actual));
            }
        }

        Ok(())
    }

    /// Whether a local file already satisfies every configured constraint.
    ///
    /// Returns `false` when no constraint is configured, when the file is
    /// missing, or when any constraint fails; only unexpected I/O errors
    /// are reported as errors.
    pub async fn verify_local(
        &self,
        path: &Path,
        expected_size: Option<u64>,
        expected_checksum: Option<&str>,
    ) -> Result<bool, DownloadError> {
        if expected_size.is_none() && expected_checksum.is_none() {
            return Ok(false);
        }
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(DownloadError::from_io_error(&e)),
        }

        match self.verify(path, expected_size, expected_checksum).await {
            Ok(()) => Ok(true),
            Err(e) if e.discards_partial() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Returns `None` if `cancel` fired before the last block was read.
fn hash_reader<D: Digest>(
    mut reader: impl Read,
    cancel: &CancellationToken,
) -> std::io::Result<Option<String>> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(Some(hex::encode(hasher.finalize())))
}
