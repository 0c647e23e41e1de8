//! Download event emitter port.
//!
//! This port abstracts event delivery so the download manager can publish
//! changes without coupling to whoever renders them (a terminal table, a GUI
//! list model, a log sink).

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::download::DownloadEvent;

/// Default capacity of the broadcast ring buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Port for emitting download events.
///
/// Implementations must not block: workers call `emit` in the middle of a
/// transfer and continue immediately.
pub trait DownloadEventEmitterPort: Send + Sync {
    /// Emit a download event.
    fn emit(&self, event: DownloadEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort>;
}

/// A subscriber that reacts to download events.
///
/// Observers are driven from their own task (see [`BroadcastEmitter::attach`]),
/// so a slow observer delays only itself.
pub trait DownloadObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &DownloadEvent);

    /// Called once if the observer fell behind and events were dropped.
    fn on_lagged(&self, missed: u64) {
        tracing::warn!(missed, "Download observer lagged; events dropped");
    }
}

/// A no-op download event emitter for tests and contexts without observers.
#[derive(Debug, Clone, Default)]
pub struct NoopDownloadEmitter;

impl NoopDownloadEmitter {
    /// Create a new no-op download emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DownloadEventEmitterPort for NoopDownloadEmitter {
    fn emit(&self, _event: DownloadEvent) {}

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}

/// Publish-and-continue emitter backed by a tokio broadcast channel.
///
/// Every subscriber sees events in emission order. A subscriber that falls
/// more than the channel capacity behind loses the oldest events instead of
/// stalling the publisher.
#[derive(Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<DownloadEvent>,
}

impl BroadcastEmitter {
    /// Create an emitter with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an emitter with an explicit ring buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Drive `observer` from a dedicated task until the emitter is dropped.
    ///
    /// Must be called from within a tokio runtime. Abort the returned handle to
    /// detach the observer early.
    pub fn attach(&self, observer: Arc<dyn DownloadObserver>) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => observer.on_event(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => observer.on_lagged(missed),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadEventEmitterPort for BroadcastEmitter {
    fn emit(&self, event: DownloadEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}
