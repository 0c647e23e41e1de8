//! Download worker pipeline.
//!
//! This module contains the per-download execution logic, isolated from the
//! queue orchestration. The worker drives one `Download` through
//! `Connecting`, then `NotModified` or `Resuming`/`Downloading`, then
//! optionally `Processing`. The terminal transition is left to the manager so
//! that success and failure are committed in one place.
//!
//! # Design Principles
//!
//! - Worker receives a `DownloadJob` (value type) and `WorkerDeps` (cloned Arcs)
//! - Cancellation is handled via `tokio::select!` around network I/O, hashing
//!   and extraction, and re-checked before every state transition
//! - A size or checksum mismatch deletes the written bytes; every other
//!   failure leaves them as the basis for a later resume

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use routefetch_core::download::{Action, DownloadError, DownloadEvent, DownloadState};
use routefetch_core::ports::{DownloadEventEmitterPort, DownloadManagerConfig, HttpTransportPort};

use crate::executor::{DISPOSED_REASON, TransferExecutor, remove_if_exists};
use crate::extract::ArchiveExtractor;
use crate::progress::ProgressThrottle;
use crate::verify::ChecksumVerifier;

use super::download::Download;
use super::paths::DownloadDestination;

/// Dependencies for the download worker.
///
/// These are cloned Arc references to ports, allowing the worker
/// to operate independently of the manager's state.
#[derive(Clone)]
pub struct WorkerDeps {
    /// Transport used for every exchange.
    pub transport: Arc<dyn HttpTransportPort>,
    /// Sink for progress events.
    pub event_emitter: Arc<dyn DownloadEventEmitterPort>,
    /// Timeouts, digest default and progress interval.
    pub config: DownloadManagerConfig,
}

/// A download job to be executed by the worker.
pub struct DownloadJob {
    /// The download being driven.
    pub download: Arc<Download>,
    /// Source URL, already validated.
    pub url: Url,
    /// Cancellation token for this job (child of the manager's root token).
    pub cancel: CancellationToken,
}

/// How a job ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletedJob {
    /// The local file already matched; nothing was transferred.
    NotModified,
    /// The target file holds the verified bytes.
    Copied { bytes: u64 },
    /// The archive was verified and expanded.
    Extracted { bytes: u64, files: Vec<PathBuf> },
}

/// Run a download job up to (not including) its terminal state.
///
/// # Cancellation
///
/// The job can be cancelled via `job.cancel`. When cancelled, this returns
/// `Err(DownloadError::Cancelled)` and keeps any partial file.
pub async fn run_job(job: &DownloadJob, deps: &WorkerDeps) -> Result<CompletedJob, DownloadError> {
    let download = &job.download;
    let request = download.request();

    download.transition(DownloadState::Connecting)?;
    ensure_live(&job.cancel)?;

    let expected_checksum = request.expected_checksum.as_deref();
    let verifier = ChecksumVerifier::for_request(
        request.checksum_algorithm,
        expected_checksum,
        deps.config.default_digest,
    )
    .with_cancellation(job.cancel.clone());
    let destination = DownloadDestination::plan(request)?;

    // Step 1: Is the local copy already correct?
    if let Some(existing) = destination.existing_file() {
        if verifier
            .verify_local(existing, request.expected_size, expected_checksum)
            .await?
        {
            tracing::info!(
                target: "routefetch.download",
                id = %download.id(),
                path = %existing.display(),
                "Local file already up to date"
            );
            let local_len = tokio::fs::metadata(existing)
                .await
                .map_err(|e| DownloadError::from_io_error(&e))?
                .len();
            download.set_bytes_transferred(local_len);
            ensure_live(&job.cancel)?;
            download.transition(DownloadState::NotModified)?;
            return Ok(CompletedJob::NotModified);
        }
    }

    // Step 2: Decide where the transfer starts.
    let offset = if request.has_verification() {
        let offset = resume_offset(&destination, request.expected_size).await?;
        tracing::debug!(
            target: "routefetch.download",
            id = %download.id(),
            offset,
            "Resuming"
        );
        ensure_live(&job.cancel)?;
        download.transition(DownloadState::Resuming)?;
        offset
    } else {
        0
    };

    // Step 3: Transfer.
    let path = destination.write_path().to_path_buf();
    let executor = TransferExecutor::new(
        deps.transport.as_ref(),
        &job.cancel,
        deps.config.read_timeout,
    );
    let transfer = executor.open(&job.url, &path, offset).await?;
    download.set_bytes_transferred(transfer.start_at());
    download.transition(DownloadState::Downloading)?;

    let mut throttle = ProgressThrottle::new(deps.config.progress_interval);
    let emitter = &deps.event_emitter;
    let id = download.id();
    let outcome = executor
        .stream(transfer, |done, total| {
            download.set_bytes_transferred(done);
            if let Some((done, total)) = throttle.observe(done, total) {
                emitter.emit(DownloadEvent::progress(id, done, total));
            }
        })
        .await;
    if let Some((done, total)) = throttle.finish() {
        emitter.emit(DownloadEvent::progress(id, done, total));
    }
    let outcome = outcome?;

    // Step 4: Verify what is on disk.
    if let Err(e) = verifier
        .verify(&path, request.expected_size, expected_checksum)
        .await
    {
        if e.discards_partial() {
            remove_if_exists(&path).await?;
        }
        return Err(e);
    }

    // Step 5: Post-process.
    match (request.action, destination.extract_dir()) {
        (Action::Extract, Some(dir)) => {
            ensure_live(&job.cancel)?;
            download.transition(DownloadState::Processing)?;
            let files = ArchiveExtractor::new(job.cancel.clone())
                .extract(&path, dir)
                .await?;
            tracing::debug!(
                target: "routefetch.download",
                id = %download.id(),
                files = files.len(),
                "Archive extracted"
            );
            Ok(CompletedJob::Extracted {
                bytes: outcome.file_len,
                files,
            })
        }
        _ => Ok(CompletedJob::Copied {
            bytes: outcome.file_len,
        }),
    }
}

/// Fail with a cancellation once the job's token has fired.
pub(crate) fn ensure_live(cancel: &CancellationToken) -> Result<(), DownloadError> {
    if cancel.is_cancelled() {
        Err(DownloadError::cancelled(DISPOSED_REASON))
    } else {
        Ok(())
    }
}

/// Byte offset to resume from.
///
/// A local file at least as long as the expected size cannot be a prefix of
/// the resource and is discarded.
async fn resume_offset(
    destination: &DownloadDestination,
    expected_size: Option<u64>,
) -> Result<u64, DownloadError> {
    let Some(existing) = destination.existing_file() else {
        return Ok(0);
    };
    let local_len = tokio::fs::metadata(existing)
        .await
        .map_err(|e| DownloadError::from_io_error(&e))?
        .len();

    match expected_size {
        Some(expected) if local_len >= expected => {
            remove_if_exists(existing).await?;
            Ok(0)
        }
        _ => Ok(local_len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;
    use routefetch_core::download::{DownloadId, DownloadRequest};
    use routefetch_core::ports::{NoopDownloadEmitter, ResponseKind, TransferResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CONTENT: &[u8] = b"The quick brown fox jumps over the lazy dog";
    const CONTENT_SHA1: &str = "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12";

    #[derive(Default)]
    struct CountingTransport {
        opens: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransportPort for CountingTransport {
        async fn open(&self, _url: &Url, offset: u64) -> Result<TransferResponse, DownloadError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let start = usize::try_from(offset).unwrap();
            let content: &'static [u8] = CONTENT;
            let (kind, body) = if start > 0 {
                (ResponseKind::Partial, &content[start..])
            } else {
                (ResponseKind::Full, content)
            };
            Ok(TransferResponse {
                kind,
                content_length: Some(body.len() as u64),
                total_length: None,
                body: Box::pin(stream::iter(vec![Ok(Bytes::from_static(body))])),
            })
        }
    }

    fn job(request: DownloadRequest) -> DownloadJob {
        let url = request.validate().unwrap();
        DownloadJob {
            download: Download::new(
                DownloadId::new(1),
                request,
                Arc::new(NoopDownloadEmitter::new()),
            ),
            url,
            cancel: CancellationToken::new(),
        }
    }

    fn deps(transport: Arc<CountingTransport>) -> WorkerDeps {
        WorkerDeps {
            transport,
            event_emitter: Arc::new(NoopDownloadEmitter::new()),
            config: DownloadManagerConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_plain_copy_skips_resuming() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fox.txt");
        let transport = Arc::new(CountingTransport::default());
        let job = job(DownloadRequest::new("fox", "http://localhost/fox", &target));

        let completed = run_job(&job, &deps(Arc::clone(&transport))).await.unwrap();

        assert_eq!(
            completed,
            CompletedJob::Copied {
                bytes: CONTENT.len() as u64
            }
        );
        assert_eq!(
            job.download.history(),
            vec![
                DownloadState::Queued,
                DownloadState::Connecting,
                DownloadState::Downloading
            ]
        );
        assert_eq!(std::fs::read(&target).unwrap(), CONTENT);
    }

    #[tokio::test]
    async fn test_not_modified_makes_no_request() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fox.txt");
        std::fs::write(&target, CONTENT).unwrap();
        let transport = Arc::new(CountingTransport::default());
        let job = job(
            DownloadRequest::new("fox", "http://localhost/fox", &target)
                .with_expected_size(Some(CONTENT.len() as u64))
                .with_expected_checksum(Some(CONTENT_SHA1.to_uppercase())),
        );

        let completed = run_job(&job, &deps(Arc::clone(&transport))).await.unwrap();

        assert_eq!(completed, CompletedJob::NotModified);
        assert_eq!(job.download.state(), DownloadState::NotModified);
        assert_eq!(transport.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prefix_is_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fox.txt");
        std::fs::write(&target, &CONTENT[..10]).unwrap();
        let transport = Arc::new(CountingTransport::default());
        let job = job(
            DownloadRequest::new("fox", "http://localhost/fox", &target)
                .with_expected_checksum(Some(CONTENT_SHA1.to_string())),
        );

        run_job(&job, &deps(transport)).await.unwrap();

        assert!(job.download.has_visited(DownloadState::Resuming));
        assert_eq!(std::fs::read(&target).unwrap(), CONTENT);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_discards_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fox.txt");
        let transport = Arc::new(CountingTransport::default());
        let job = job(
            DownloadRequest::new("fox", "http://localhost/fox", &target)
                .with_expected_checksum(Some("notdefined".into())),
        );

        let err = run_job(&job, &deps(transport)).await.unwrap_err();

        assert!(matches!(err, DownloadError::ChecksumMismatch { .. }));
        assert_eq!(job.download.state(), DownloadState::Downloading);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_oversized_local_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fox.txt");
        std::fs::write(&target, vec![b'x'; CONTENT.len() + 5]).unwrap();
        let transport = Arc::new(CountingTransport::default());
        let job = job(
            DownloadRequest::new("fox", "http://localhost/fox", &target)
                .with_expected_size(Some(CONTENT.len() as u64)),
        );

        run_job(&job, &deps(transport)).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), CONTENT);
    }

    #[tokio::test]
    async fn test_cancelled_job_skips_local_check_and_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fox.txt");
        std::fs::write(&target, CONTENT).unwrap();
        let transport = Arc::new(CountingTransport::default());
        let job = job(
            DownloadRequest::new("fox", "http://localhost/fox", &target)
                .with_expected_checksum(Some(CONTENT_SHA1.to_string())),
        );
        job.cancel.cancel();

        let err = run_job(&job, &deps(Arc::clone(&transport))).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(!job.download.has_visited(DownloadState::NotModified));
        assert_eq!(transport.opens.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(&target).unwrap(), CONTENT);
    }
}
