//! The per-download state cell.
//!
//! A `Download` is shared between the caller (who holds the handle returned
//! by `queue_for_download`), the manager's collection and, while it runs, one
//! worker. Only the worker and the manager mutate it; every mutation goes
//! through [`Download::transition`], which enforces the state graph and
//! publishes the change.
//!
//! Waiting is per download: each handle owns a `watch` channel that ticks on
//! every transition, so a waiter is never woken by unrelated downloads.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::watch;

use routefetch_core::download::{
    Action, DownloadError, DownloadEvent, DownloadId, DownloadRequest, DownloadState,
    DownloadSummary,
};
use routefetch_core::ports::DownloadEventEmitterPort;

/// Mutable part of a download.
#[derive(Debug)]
struct Record {
    state: DownloadState,
    history: Vec<DownloadState>,
    last_error: Option<DownloadError>,
    bytes_transferred: u64,
}

/// Handle to one requested transfer.
pub struct Download {
    id: DownloadId,
    request: DownloadRequest,
    record: RwLock<Record>,
    changed: watch::Sender<u64>,
    emitter: Arc<dyn DownloadEventEmitterPort>,
}

impl Download {
    /// Create a download in `Queued`.
    pub(crate) fn new(
        id: DownloadId,
        request: DownloadRequest,
        emitter: Arc<dyn DownloadEventEmitterPort>,
    ) -> Arc<Self> {
        let (changed, _) = watch::channel(0);
        Arc::new(Self {
            id,
            request,
            record: RwLock::new(Record {
                state: DownloadState::Queued,
                history: vec![DownloadState::Queued],
                last_error: None,
                bytes_transferred: 0,
            }),
            changed,
            emitter,
        })
    }

    pub const fn id(&self) -> DownloadId {
        self.id
    }

    /// The request this download was created from.
    pub const fn request(&self) -> &DownloadRequest {
        &self.request
    }

    pub fn description(&self) -> &str {
        &self.request.description
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn target(&self) -> &Path {
        &self.request.target
    }

    pub const fn action(&self) -> Action {
        self.request.action
    }

    /// Current state. Never observes a half-applied transition.
    pub fn state(&self) -> DownloadState {
        self.read().state
    }

    /// Every state visited so far, in order, starting with `Queued`.
    pub fn history(&self) -> Vec<DownloadState> {
        self.read().history.clone()
    }

    /// Whether `state` has been visited.
    pub fn has_visited(&self, state: DownloadState) -> bool {
        self.read().history.contains(&state)
    }

    /// The error that moved this download to `Failed`.
    pub fn last_error(&self) -> Option<DownloadError> {
        self.read().last_error.clone()
    }

    /// Bytes present in the target after the last progress update.
    pub fn bytes_transferred(&self) -> u64 {
        self.read().bytes_transferred
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Row for observers rendering a list.
    pub fn summary(&self) -> DownloadSummary {
        let record = self.read();
        DownloadSummary {
            id: self.id,
            description: self.request.description.clone(),
            url: self.request.url.clone(),
            target: self.request.target.clone(),
            action: self.request.action,
            state: record.state,
            bytes_transferred: record.bytes_transferred,
            expected_size: self.request.expected_size,
            error: record.last_error.clone(),
        }
    }

    /// Wait until `state` has been visited.
    ///
    /// Returns `false` if `timeout` elapses first, or as soon as the download
    /// is terminal without having visited `state`.
    pub async fn wait_for(&self, state: DownloadState, timeout: Duration) -> bool {
        let mut rx = self.changed.subscribe();
        let wait = async {
            loop {
                {
                    let record = self.read();
                    if record.history.contains(&state) {
                        return true;
                    }
                    if record.state.is_terminal() {
                        return false;
                    }
                }
                // The sender lives as long as `self`.
                if rx.changed().await.is_err() {
                    return self.has_visited(state);
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    /// Wait for a terminal state, returning it, or `None` on timeout.
    pub async fn wait_until_terminal(&self, timeout: Duration) -> Option<DownloadState> {
        let mut rx = self.changed.subscribe();
        let wait = async {
            loop {
                let state = self.state();
                if state.is_terminal() {
                    return Some(state);
                }
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }

    /// Move to `next`, publishing a `StateChanged` event.
    ///
    /// Illegal moves are refused and leave the download untouched.
    pub(crate) fn transition(&self, next: DownloadState) -> Result<(), DownloadError> {
        self.apply(next, None)
    }

    /// Move to `Failed` with `error` attached.
    pub(crate) fn fail(&self, error: DownloadError) -> Result<(), DownloadError> {
        self.apply(DownloadState::Failed, Some(error))
    }

    /// Record the current byte count. Does not emit an event.
    pub(crate) fn set_bytes_transferred(&self, bytes: u64) {
        self.write().bytes_transferred = bytes;
    }

    fn apply(&self, next: DownloadState, error: Option<DownloadError>) -> Result<(), DownloadError> {
        let from = {
            let mut record = self.write();
            let from = record.state;
            if !from.can_transition_to(next) {
                return Err(DownloadError::invalid_transition(from, next));
            }
            record.state = next;
            record.history.push(next);
            if error.is_some() {
                record.last_error.clone_from(&error);
            }
            from
        };

        tracing::debug!(
            target: "routefetch.download",
            id = %self.id,
            %from,
            to = %next,
            "State changed"
        );

        // Emit before waking waiters so an observer never lags a waiter.
        self.emitter
            .emit(DownloadEvent::state_changed(self.id, from, next, error));
        self.changed.send_modify(|seq| *seq += 1);
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("id", &self.id)
            .field("url", &self.request.url)
            .field("target", &self.request.target)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
