//! Download domain types, events, errors, and the state graph.
//!
//! This module contains pure data types. No I/O, networking, or runtime
//! dependencies allowed (request validation only peeks at the filesystem to
//! tell files from directories).
//!
//! # Structure
//!
//! - `types` - Identifiers and enums (`DownloadId`, `Action`, `DigestAlgorithm`)
//! - `state` - `DownloadState` and its legal transitions
//! - `request` - `DownloadRequest` and synchronous validation
//! - `events` - `DownloadEvent`, `DownloadSummary`, `QueueSnapshot`
//! - `errors` - `DownloadError` and `ErrorKind`

pub mod errors;
pub mod events;
pub mod request;
pub mod state;
pub mod types;

pub use errors::{DownloadError, DownloadResult, ErrorKind};
pub use events::{DownloadEvent, DownloadSummary, QueueSnapshot};
pub use request::DownloadRequest;
pub use state::DownloadState;
pub use types::{Action, DigestAlgorithm, DownloadId};
