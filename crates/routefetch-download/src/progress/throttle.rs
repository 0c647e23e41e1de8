//! Progress throttling.
//!
//! Rate-limits progress updates to avoid overwhelming observers with events
//! while making sure the last value is never lost.

use std::time::{Duration, Instant};

/// Rate-limiter for byte-progress updates.
///
/// Every observed value is either returned for emission immediately or held
/// as pending; [`finish`](Self::finish) hands back the held value so the final
/// byte count always reaches observers.
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
    pending: Option<(u64, u64)>,
}

impl ProgressThrottle {
    /// Create a new throttle with the specified minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
            pending: None,
        }
    }

    /// Record `(downloaded, total)`; returns it if it should be emitted now.
    pub fn observe(&mut self, downloaded: u64, total: u64) -> Option<(u64, u64)> {
        let now = Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => {
                self.pending = Some((downloaded, total));
                None
            }
            _ => {
                self.last_emit = Some(now);
                self.pending = None;
                Some((downloaded, total))
            }
        }
    }

    /// Take the value held back by the interval, if any.
    pub const fn finish(&mut self) -> Option<(u64, u64)> {
        self.pending.take()
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}
