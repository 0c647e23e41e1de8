//! Download state machine.
//!
//! `DownloadState` is a plain value; the legal edges between states live in
//! [`DownloadState::can_transition_to`] so every component that mutates a
//! download checks against the same graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single download.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Admitted, waiting for a worker.
    Queued,
    /// A worker owns the download and is inspecting the target / opening the connection.
    Connecting,
    /// The local file already satisfies the expected size and checksum.
    NotModified,
    /// Continuing (or verifiably starting) a transfer that has a validation basis.
    Resuming,
    /// Bytes are streaming to disk.
    Downloading,
    /// Post-processing (archive extraction) is running.
    Processing,
    /// Terminal success.
    Succeeded,
    /// Terminal failure; the download's `last_error` says why.
    Failed,
}

impl DownloadState {
    /// All states in path order.
    pub const ALL: [Self; 8] = [
        Self::Queued,
        Self::Connecting,
        Self::NotModified,
        Self::Resuming,
        Self::Downloading,
        Self::Processing,
        Self::Succeeded,
        Self::Failed,
    ];

    /// Whether no further transitions can happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether a worker currently owns the download.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::NotModified | Self::Resuming | Self::Downloading | Self::Processing
        )
    }

    /// Check whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        use DownloadState::{
            Connecting, Downloading, Failed, NotModified, Processing, Queued, Resuming, Succeeded,
        };
        match (*self, next) {
            (Queued | Connecting | Resuming | Downloading | Processing, Failed) => true,
            (Queued, Connecting)
            | (Connecting, NotModified | Resuming | Downloading)
            | (NotModified, Succeeded)
            | (Resuming, Downloading)
            | (Downloading, Processing | Succeeded)
            | (Processing, Succeeded) => true,
            _ => false,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Connecting => "connecting",
            Self::NotModified => "not_modified",
            Self::Resuming => "resuming",
            Self::Downloading => "downloading",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DownloadState::*;

    #[test]
    fn test_happy_paths_are_legal() {
        let paths: [&[DownloadState]; 4] = [
            &[Queued, Connecting, Downloading, Succeeded],
            &[Queued, Connecting, Resuming, Downloading, Succeeded],
            &[Queued, Connecting, Resuming, Downloading, Processing, Succeeded],
            &[Queued, Connecting, NotModified, Succeeded],
        ];
        for path in paths {
            for pair in path.windows(2) {
                assert!(
                    pair[0].can_transition_to(pair[1]),
                    "{} -> {} should be legal",
                    pair[0],
                    pair[1]
                );
            }
        }
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        for state in [Queued, Connecting, Resuming, Downloading, Processing] {
            assert!(state.can_transition_to(Failed), "{state} -> failed");
        }
        assert!(!NotModified.can_transition_to(Failed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [Succeeded, Failed] {
            assert!(terminal.is_terminal());
            for next in DownloadState::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_no_backwards_edges() {
        assert!(!Downloading.can_transition_to(Resuming));
        assert!(!Connecting.can_transition_to(Queued));
        assert!(!Queued.can_transition_to(Downloading));
        assert!(!Resuming.can_transition_to(Succeeded));
        assert!(!Connecting.can_transition_to(Processing));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&NotModified).unwrap();
        assert_eq!(json, "\"not_modified\"");
        assert_eq!(NotModified.to_string(), "not_modified");
    }
}
