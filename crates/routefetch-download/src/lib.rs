#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

// Silence dev-dependencies only used by the integration tests.
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use wiremock as _;

// Re-export core types for convenience
pub use routefetch_core::download::{
    Action, DigestAlgorithm, DownloadError, DownloadEvent, DownloadId, DownloadRequest,
    DownloadState, DownloadSummary, QueueSnapshot,
};
pub use routefetch_core::ports::{
    DownloadManagerConfig, DownloadManagerPort, DownloadObserver, HttpTransportPort,
};

// Building blocks, public so adapters and tests can drive them directly
pub mod executor;
pub mod extract;
pub mod progress;
pub mod queue;
pub mod verify;

pub use executor::{DISPOSED_REASON, ReqwestTransport, TransferExecutor};
pub use extract::ArchiveExtractor;
pub use progress::ProgressThrottle;
pub use verify::ChecksumVerifier;

// Public API - download manager
mod manager;

pub use manager::{
    CompletedJob, Download, DownloadDestination, DownloadJob, DownloadManagerDeps,
    DownloadManagerImpl, WorkerDeps,
};
