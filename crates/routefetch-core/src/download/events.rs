//! Download events - discriminated union for all observable changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::errors::DownloadError;
use super::state::DownloadState;
use super::types::{Action, DownloadId};

/// A summary of one download (one row of a live download list).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSummary {
    /// Download identifier.
    pub id: DownloadId,
    /// Human label supplied with the request.
    pub description: String,
    /// Source URL as requested.
    pub url: String,
    /// Destination path.
    pub target: PathBuf,
    /// Post-processing action.
    pub action: Action,
    /// Current state.
    pub state: DownloadState,
    /// Bytes written to the target during the current transfer (including a resumed prefix).
    pub bytes_transferred: u64,
    /// Expected size if the request carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_size: Option<u64>,
    /// Error if the state is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DownloadError>,
}

/// Snapshot of every download the manager owns, in admission order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// All downloads, oldest first.
    pub items: Vec<DownloadSummary>,
    /// Downloads still waiting in `Queued`.
    pub pending_count: u32,
    /// Downloads currently owned by a worker.
    pub active_count: u32,
}

impl QueueSnapshot {
    /// Whether nothing is pending or in flight.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.pending_count == 0 && self.active_count == 0
    }
}

/// Single discriminated union for all download events.
///
/// Serialized with a `type` tag so non-Rust observers can switch on it:
///
/// ```text
/// { "type": "download_added", "summary": { ... } }
/// { "type": "state_changed", "id": 3, "from": "connecting", "to": "resuming" }
/// { "type": "progress", "id": 3, "downloaded": 1024, "total": 4096 }
/// { "type": "removed", "id": 3 }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// A download was admitted (always the first event for an id).
    DownloadAdded {
        /// Initial row contents.
        summary: DownloadSummary,
    },

    /// A download moved along the state graph.
    StateChanged {
        /// Download identifier.
        id: DownloadId,
        /// State before the transition.
        from: DownloadState,
        /// State after the transition.
        to: DownloadState,
        /// Set when `to` is `Failed`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<DownloadError>,
    },

    /// Byte progress of an in-flight transfer.
    Progress {
        /// Download identifier.
        id: DownloadId,
        /// Bytes on disk so far.
        downloaded: u64,
        /// Total bytes if known (0 otherwise).
        total: u64,
    },

    /// A terminal download was removed from the collection.
    Removed {
        /// Download identifier.
        id: DownloadId,
    },
}

impl DownloadEvent {
    /// Create an added event.
    #[must_use]
    pub const fn added(summary: DownloadSummary) -> Self {
        Self::DownloadAdded { summary }
    }

    /// Create a state change event.
    #[must_use]
    pub const fn state_changed(
        id: DownloadId,
        from: DownloadState,
        to: DownloadState,
        error: Option<DownloadError>,
    ) -> Self {
        Self::StateChanged { id, from, to, error }
    }

    /// Create a progress event.
    #[must_use]
    pub const fn progress(id: DownloadId, downloaded: u64, total: u64) -> Self {
        Self::Progress {
            id,
            downloaded,
            total,
        }
    }

    /// Get the download ID from any event type.
    #[must_use]
    pub const fn id(&self) -> DownloadId {
        match self {
            Self::DownloadAdded { summary } => summary.id,
            Self::StateChanged { id, .. } | Self::Progress { id, .. } | Self::Removed { id } => *id,
        }
    }

    /// The state this event leaves the download in, if the event carries one.
    #[must_use]
    pub const fn new_state(&self) -> Option<DownloadState> {
        match self {
            Self::DownloadAdded { summary } => Some(summary.state),
            Self::StateChanged { to, .. } => Some(*to),
            Self::Progress { .. } | Self::Removed { .. } => None,
        }
    }

    /// Get the event name for wire protocols.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::DownloadAdded { .. } => "download:added",
            Self::StateChanged { .. } => "download:state_changed",
            Self::Progress { .. } => "download:progress",
            Self::Removed { .. } => "download:removed",
        }
    }
}
