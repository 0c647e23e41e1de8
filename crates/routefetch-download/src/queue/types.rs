//! Queue item types (internal implementation).

use std::path::PathBuf;
use std::time::Instant;

use routefetch_core::download::DownloadId;
use url::Url;

/// A download waiting for a worker.
///
/// Carries only what the scheduler needs: identity, the parsed source URL and
/// the normalized target used for the single-writer rule.
#[derive(Clone, Debug)]
pub struct QueuedItem {
    /// The download identifier.
    pub id: DownloadId,
    /// Source URL, parsed at admission.
    pub url: Url,
    /// Lexically normalized target path.
    pub target: PathBuf,
    /// When this item was admitted (for ordering/debugging).
    pub queued_at: Instant,
}

impl QueuedItem {
    /// Create a new queued item.
    pub fn new(id: DownloadId, url: Url, target: PathBuf) -> Self {
        Self {
            id,
            url,
            target,
            queued_at: Instant::now(),
        }
    }
}
