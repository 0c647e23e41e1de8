#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod download;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use download::{
    Action, DigestAlgorithm, DownloadError, DownloadEvent, DownloadId, DownloadRequest,
    DownloadResult, DownloadState, DownloadSummary, ErrorKind, QueueSnapshot,
};
pub use ports::{
    BodyStream, BroadcastEmitter, DEFAULT_EVENT_CAPACITY, DownloadEventEmitterPort,
    DownloadManagerConfig, DownloadManagerPort, DownloadObserver, HttpTransportPort,
    NoopDownloadEmitter, ResponseKind, TransferResponse, WAIT_TIMEOUT,
};
pub use settings::{Settings, SettingsError, SettingsUpdate, validate_settings};
