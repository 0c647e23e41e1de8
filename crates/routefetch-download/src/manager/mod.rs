//! Download manager implementation.
//!
//! This module provides the concrete implementation of `DownloadManagerPort`
//! with a fixed pool of long-lived workers, a pure queue state machine, and a
//! cancellation token tree for shutdown.
//!
//! # Architecture
//!
//! - **Manager**: Owns the observable collection, the queue and the workers
//! - **Worker**: Executes one download at a time (see [`worker::run_job`])
//! - **Download**: Per-download state cell; every transition is published
//!   through the event emitter and wakes that download's waiters
//!
//! # Concurrency Model
//!
//! - `max_concurrent` workers, started once by [`DownloadManagerImpl::start`]
//! - `Notify` for efficient wake-on-work
//! - The queue never hands out two items with the same normalized target
//! - Lock order: downloads → queue (consistent everywhere)

mod download;
mod paths;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use routefetch_core::download::{
    Action, DownloadError, DownloadEvent, DownloadId, DownloadRequest, DownloadState,
    DownloadSummary, QueueSnapshot,
};
use routefetch_core::ports::{
    DownloadEventEmitterPort, DownloadManagerConfig, DownloadManagerPort, HttpTransportPort,
};

use crate::executor::DISPOSED_REASON;
use crate::queue::{DownloadQueue, QueuedItem};

pub use download::Download;
pub use paths::DownloadDestination;
pub use worker::{CompletedJob, DownloadJob, WorkerDeps};

/// Dependencies for creating a download manager.
///
/// This struct bundles all the ports and configuration needed
/// to construct a `DownloadManagerImpl`.
pub struct DownloadManagerDeps<T, E>
where
    T: HttpTransportPort + 'static,
    E: DownloadEventEmitterPort + 'static,
{
    /// Port for HTTP exchanges.
    pub transport: Arc<T>,
    /// Port for emitting download events.
    pub event_emitter: Arc<E>,
    /// Configuration for the download manager.
    pub config: DownloadManagerConfig,
}

/// Concrete implementation of the download manager.
///
/// Adapters that only need ids and summaries can hold it as
/// `Arc<dyn DownloadManagerPort>`.
pub struct DownloadManagerImpl {
    /// Every admitted download, in admission order.
    downloads: RwLock<IndexMap<DownloadId, Arc<Download>>>,
    /// Pending items and reserved targets.
    queue: Mutex<DownloadQueue>,
    /// Cloned into each worker.
    deps: WorkerDeps,
    /// Wakes an idle worker when work is queued.
    work_notify: Notify,
    /// Parent of every job's cancellation token.
    shutdown: CancellationToken,
    /// Set once by `dispose`.
    disposed: AtomicBool,
    /// Worker task handles, taken by `dispose`.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DownloadManagerImpl {
    /// Create the manager and spawn its worker pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T, E>(deps: DownloadManagerDeps<T, E>) -> Arc<Self>
    where
        T: HttpTransportPort + 'static,
        E: DownloadEventEmitterPort + 'static,
    {
        let worker_count = deps.config.worker_count();
        let manager = Arc::new(Self {
            downloads: RwLock::new(IndexMap::new()),
            queue: Mutex::new(DownloadQueue::new(deps.config.max_queue_size)),
            deps: WorkerDeps {
                transport: deps.transport,
                event_emitter: deps.event_emitter,
                config: deps.config,
            },
            work_notify: Notify::new(),
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        });

        let handles: Vec<_> = (0..worker_count)
            .map(|index| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.worker_loop(index).await })
            })
            .collect();

        // Nothing else can hold the lock yet.
        if let Ok(mut workers) = manager.workers.try_lock() {
            *workers = handles;
        }

        tracing::info!(
            target: "routefetch.download",
            workers = worker_count,
            max_queue_size = manager.deps.config.max_queue_size,
            "Download manager started"
        );
        manager
    }

    /// The configuration the manager was started with.
    pub const fn config(&self) -> &DownloadManagerConfig {
        &self.deps.config
    }

    /// Admit a request and return its handle.
    ///
    /// Never fails and never touches the network. A request that cannot be
    /// admitted (invalid, queue full, manager disposed) is returned already
    /// `Failed` with the reason attached.
    pub async fn queue_for_download(&self, request: DownloadRequest) -> Arc<Download> {
        let id = DownloadId::next();
        let download = Download::new(id, request, Arc::clone(&self.deps.event_emitter));

        let admission = {
            let mut downloads = self.downloads.write().await;
            downloads.insert(id, Arc::clone(&download));
            self.deps
                .event_emitter
                .emit(DownloadEvent::added(download.summary()));
            self.admit(&download).await
        };

        match admission {
            Ok(position) => {
                tracing::debug!(
                    target: "routefetch.download",
                    %id,
                    url = %download.url(),
                    target = %download.target().display(),
                    position,
                    "Download queued"
                );
                self.work_notify.notify_one();
            }
            Err(error) => {
                tracing::warn!(
                    target: "routefetch.download",
                    %id,
                    url = %download.url(),
                    %error,
                    "Download rejected"
                );
                Self::commit_failure(&download, error);
            }
        }

        download
    }

    /// Positional convenience for [`queue_for_download`](Self::queue_for_download).
    pub async fn queue(
        &self,
        description: impl Into<String>,
        url: impl Into<String>,
        expected_size: Option<u64>,
        expected_checksum: Option<String>,
        action: Action,
        target: impl Into<PathBuf>,
    ) -> Arc<Download> {
        let request = DownloadRequest::new(description, url, target)
            .with_expected_size(expected_size)
            .with_expected_checksum(expected_checksum)
            .with_action(action);
        self.queue_for_download(request).await
    }

    /// Every download in admission order.
    pub async fn downloads(&self) -> Vec<Arc<Download>> {
        self.downloads.read().await.values().cloned().collect()
    }

    /// Look up a download.
    pub async fn get(&self, id: DownloadId) -> Option<Arc<Download>> {
        self.downloads.read().await.get(&id).cloned()
    }

    /// Summaries plus queue counters.
    pub async fn snapshot(&self) -> QueueSnapshot {
        let downloads = self.downloads.read().await;
        let queue = self.queue.lock().await;
        QueueSnapshot {
            items: downloads.values().map(|d| d.summary()).collect(),
            pending_count: u32::try_from(queue.pending_len()).unwrap_or(u32::MAX),
            active_count: u32::try_from(queue.active_len()).unwrap_or(u32::MAX),
        }
    }

    /// Remove a terminal download from the collection.
    pub async fn remove(&self, id: DownloadId) -> Result<Arc<Download>, DownloadError> {
        let mut downloads = self.downloads.write().await;
        let Some(download) = downloads.get(&id) else {
            return Err(DownloadError::invalid_request(format!("unknown download {id}")));
        };
        if !download.is_terminal() {
            return Err(DownloadError::invalid_request(format!(
                "download {id} is {} and cannot be removed",
                download.state()
            )));
        }
        let removed = downloads.shift_remove(&id);
        drop(downloads);

        self.deps.event_emitter.emit(DownloadEvent::Removed { id });
        removed.ok_or_else(|| DownloadError::invalid_request(format!("unknown download {id}")))
    }

    /// Whether `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Number of worker tasks not yet joined.
    pub async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Stop all workers, cancel in-flight transfers, and reject new requests.
    ///
    /// Queued downloads fail with `Cancelled`; running downloads fail with
    /// `Cancelled` as soon as their current network operation is interrupted.
    /// Returns once every worker has exited. Idempotent.
    pub async fn dispose(&self) {
        let first = !self.disposed.swap(true, Ordering::SeqCst);

        let drained = {
            let downloads = self.downloads.read().await;
            let drained = self.queue.lock().await.close();
            drained
                .into_iter()
                .filter_map(|item| downloads.get(&item.id).cloned())
                .collect::<Vec<_>>()
        };
        for download in drained {
            Self::commit_failure(&download, DownloadError::cancelled(DISPOSED_REASON));
        }

        self.shutdown.cancel();

        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(target: "routefetch.download", error = %e, "Worker task ended abnormally");
            }
        }

        if first {
            tracing::info!(target: "routefetch.download", "Download manager disposed");
        }
    }

    // --- Scheduling ---

    async fn admit(&self, download: &Download) -> Result<u32, DownloadError> {
        if self.is_disposed() {
            return Err(DownloadError::cancelled(DISPOSED_REASON));
        }
        let url = download.request().validate()?;
        let item = QueuedItem::new(download.id(), url, download.request().normalized_target());
        self.queue.lock().await.push(item)
    }

    /// Worker loop: claim, run, release, repeat until shutdown.
    async fn worker_loop(&self, index: usize) {
        tracing::trace!(target: "routefetch.download", worker = index, "Worker started");
        loop {
            let notified = self.work_notify.notified();
            tokio::pin!(notified);
            // Register before looking at the queue so a concurrent push is not missed.
            notified.as_mut().enable();

            if self.shutdown.is_cancelled() {
                break;
            }

            let claimed = self.queue.lock().await.claim_next();
            if let Some(item) = claimed {
                self.run_item(index, item).await;
                continue;
            }

            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = &mut notified => {}
            }
        }
        tracing::trace!(target: "routefetch.download", worker = index, "Worker stopped");
    }

    async fn run_item(&self, index: usize, item: QueuedItem) {
        if let Some(download) = self.get(item.id).await {
            tracing::debug!(
                target: "routefetch.download",
                id = %item.id,
                worker = index,
                waited_ms = u64::try_from(item.queued_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Download claimed"
            );

            let job = DownloadJob {
                download,
                url: item.url,
                cancel: self.shutdown.child_token(),
            };
            // A job that finished while shutdown was underway still counts as cancelled.
            let result = worker::run_job(&job, &self.deps)
                .await
                .and_then(|completed| worker::ensure_live(&job.cancel).map(|()| completed));
            Self::finalize(&job.download, result);
        }

        self.queue.lock().await.release(&item.target);
        // The released target may unblock a waiting duplicate.
        self.work_notify.notify_one();
    }

    /// Commit the terminal state for a finished job.
    fn finalize(download: &Download, result: Result<CompletedJob, DownloadError>) {
        match result {
            Ok(completed) => {
                if let Err(e) = download.transition(DownloadState::Succeeded) {
                    tracing::warn!(target: "routefetch.download", id = %download.id(), error = %e, "Could not commit success");
                    return;
                }
                match completed {
                    CompletedJob::NotModified => tracing::info!(
                        target: "routefetch.download",
                        id = %download.id(),
                        "Download succeeded (not modified)"
                    ),
                    CompletedJob::Copied { bytes } => tracing::info!(
                        target: "routefetch.download",
                        id = %download.id(),
                        bytes,
                        target = %download.target().display(),
                        "Download succeeded"
                    ),
                    CompletedJob::Extracted { bytes, files } => tracing::info!(
                        target: "routefetch.download",
                        id = %download.id(),
                        bytes,
                        files = files.len(),
                        target = %download.target().display(),
                        "Download succeeded (extracted)"
                    ),
                }
            }
            Err(error) => {
                if error.is_cancelled() {
                    tracing::info!(target: "routefetch.download", id = %download.id(), %error, "Download cancelled");
                } else {
                    tracing::warn!(target: "routefetch.download", id = %download.id(), %error, "Download failed");
                }
                Self::commit_failure(download, error);
            }
        }
    }

    fn commit_failure(download: &Download, error: DownloadError) {
        if let Err(e) = download.fail(error) {
            tracing::debug!(target: "routefetch.download", id = %download.id(), error = %e, "Download already terminal");
        }
    }
}

#[async_trait]
impl DownloadManagerPort for DownloadManagerImpl {
    async fn submit(&self, request: DownloadRequest) -> DownloadId {
        self.queue_for_download(request).await.id()
    }

    async fn state(&self, id: DownloadId) -> Option<DownloadState> {
        self.get(id).await.map(|d| d.state())
    }

    async fn summary(&self, id: DownloadId) -> Option<DownloadSummary> {
        self.get(id).await.map(|d| d.summary())
    }

    async fn wait_for(&self, id: DownloadId, state: DownloadState, timeout: Duration) -> bool {
        match self.get(id).await {
            Some(download) => download.wait_for(state, timeout).await,
            None => false,
        }
    }

    async fn snapshot(&self) -> QueueSnapshot {
        Self::snapshot(self).await
    }

    async fn remove(&self, id: DownloadId) -> Result<(), DownloadError> {
        Self::remove(self, id).await.map(|_| ())
    }

    async fn dispose(&self) {
        Self::dispose(self).await;
    }
}
