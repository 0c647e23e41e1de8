//! Download manager port definition.
//!
//! This port defines the public interface for the download subsystem. It
//! speaks only in domain types (`DownloadRequest`, `DownloadId`,
//! `QueueSnapshot`); cancellation tokens, worker handles and HTTP clients stay
//! inside the implementation.

use async_trait::async_trait;
use std::time::Duration;

use crate::download::{
    DigestAlgorithm, DownloadError, DownloadId, DownloadRequest, DownloadState, DownloadSummary,
    QueueSnapshot,
};

/// Upper bound on how long callers (and tests) wait for a download to reach a state.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for creating a download manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadManagerConfig {
    /// Number of workers, i.e. the maximum number of simultaneous transfers.
    pub max_concurrent: u32,
    /// Maximum number of downloads waiting in `Queued`.
    pub max_queue_size: u32,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Maximum idle time between two body chunks.
    pub read_timeout: Duration,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Digest used when a request does not name one.
    pub default_digest: DigestAlgorithm,
    /// Minimum interval between two progress events for one download.
    pub progress_interval: Duration,
}

impl Default for DownloadManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_queue_size: 256,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            user_agent: concat!("routefetch/", env!("CARGO_PKG_VERSION")).to_string(),
            default_digest: DigestAlgorithm::Sha1,
            progress_interval: Duration::from_millis(250),
        }
    }
}

impl DownloadManagerConfig {
    /// Set the worker pool size (at least one worker is always started).
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the maximum queue size.
    #[must_use]
    pub const fn with_max_queue_size(mut self, max: u32) -> Self {
        self.max_queue_size = max;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-chunk read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the default digest algorithm.
    #[must_use]
    pub const fn with_default_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.default_digest = digest;
        self
    }

    /// Set the progress event interval.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Pool size actually used (never zero).
    #[must_use]
    pub fn worker_count(&self) -> usize {
        usize::try_from(self.max_concurrent.max(1)).unwrap_or(1)
    }
}

/// Port for managing downloads.
///
/// Adapters that only need ids and summaries (a web API, a GUI bridge) can
/// hold `Arc<dyn DownloadManagerPort>`; the concrete manager additionally hands
/// out live `Download` handles.
#[async_trait]
pub trait DownloadManagerPort: Send + Sync {
    /// Admit a request. Never fails: rejected requests come back as an id whose
    /// download is already `Failed`.
    async fn submit(&self, request: DownloadRequest) -> DownloadId;

    /// Current state of a download, if the manager still holds it.
    async fn state(&self, id: DownloadId) -> Option<DownloadState>;

    /// Summary row for a download, if the manager still holds it.
    async fn summary(&self, id: DownloadId) -> Option<DownloadSummary>;

    /// Wait until the download has visited `state` or `timeout` elapses.
    ///
    /// Returns `true` if the state was visited. Returns `false` on timeout, when
    /// the download reached a terminal state without visiting `state`, or when
    /// the id is unknown.
    async fn wait_for(&self, id: DownloadId, state: DownloadState, timeout: Duration) -> bool;

    /// Snapshot of every download in admission order.
    async fn snapshot(&self) -> QueueSnapshot;

    /// Remove a terminal download from the collection.
    async fn remove(&self, id: DownloadId) -> Result<(), DownloadError>;

    /// Stop all workers, cancel in-flight transfers, and reject new requests.
    ///
    /// Idempotent.
    async fn dispose(&self);
}
