//! Download queue management.
//!
//! This module provides a pure state machine for the scheduler's bookkeeping.
//! No I/O is performed here; the manager handles I/O and locking.
//!
//! # Design
//!
//! - Pure synchronous state machine (no async, no IO, no tracing)
//! - FIFO admission order, with one exception: an item whose target is
//!   currently being written by another worker is skipped until that target
//!   is released, so later items for other targets are not held up
//! - At most one claimed item per normalized target path

// Queue lengths are always well under u32::MAX in practice
#![allow(clippy::cast_possible_truncation)]

mod types;

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::executor::DISPOSED_REASON;

use routefetch_core::download::{DownloadError, DownloadId};

pub use types::QueuedItem;

/// Manages pending items and the set of targets being written.
///
/// This is a sync type with no internal locking. The caller
/// (`DownloadManagerImpl`) is responsible for synchronization.
pub struct DownloadQueue {
    pending: VecDeque<QueuedItem>,
    active_targets: HashSet<PathBuf>,
    max_size: u32,
    closed: bool,
}

impl DownloadQueue {
    /// Create a new download queue with the specified max size.
    pub fn new(max_size: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            active_targets: HashSet::new(),
            max_size,
            closed: false,
        }
    }

    /// Get the number of pending items.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Get the number of claimed (in-flight) items.
    pub fn active_len(&self) -> usize {
        self.active_targets.len()
    }

    /// Whether `close` has been called.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Check if a download ID is currently waiting.
    pub fn is_queued(&self, id: DownloadId) -> bool {
        self.pending.iter().any(|item| item.id == id)
    }

    /// Whether a worker currently holds `target`.
    pub fn is_target_active(&self, target: &Path) -> bool {
        self.active_targets.contains(target)
    }

    /// Append an item at the back of the queue.
    ///
    /// Returns the 1-based position among pending items.
    pub fn push(&mut self, item: QueuedItem) -> Result<u32, DownloadError> {
        if self.closed {
            return Err(DownloadError::cancelled(DISPOSED_REASON));
        }
        if self.pending.len() >= self.max_size as usize {
            return Err(DownloadError::queue_full(self.max_size));
        }
        self.pending.push_back(item);
        Ok(self.pending.len() as u32)
    }

    /// Claim the oldest item whose target is not being written.
    ///
    /// The claimed target stays reserved until [`release`](Self::release).
    pub fn claim_next(&mut self) -> Option<QueuedItem> {
        if self.closed {
            return None;
        }
        let index = self
            .pending
            .iter()
            .position(|item| !self.active_targets.contains(&item.target))?;
        let item = self.pending.remove(index)?;
        self.active_targets.insert(item.target.clone());
        Some(item)
    }

    /// Release a target reserved by `claim_next`.
    ///
    /// Returns `true` if the target was reserved.
    pub fn release(&mut self, target: &Path) -> bool {
        self.active_targets.remove(target)
    }

    /// Refuse further items and hand back everything still pending.
    ///
    /// Active targets stay reserved until their workers release them.
    pub fn close(&mut self) -> Vec<QueuedItem> {
        self.closed = true;
        self.pending.drain(..).collect()
    }
}
