//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the download engine expects from its
//! surroundings. They contain no implementation details and use only domain
//! types.
//!
//! # Design Rules
//!
//! - No reqwest types in any signature
//! - Event emission never blocks the caller
//! - The manager port speaks in ids and summaries, not handles

pub mod download_event_emitter;
pub mod download_manager;
pub mod http_transport;

pub use download_event_emitter::{
    BroadcastEmitter, DEFAULT_EVENT_CAPACITY, DownloadEventEmitterPort, DownloadObserver,
    NoopDownloadEmitter,
};
pub use download_manager::{DownloadManagerConfig, DownloadManagerPort, WAIT_TIMEOUT};
pub use http_transport::{BodyStream, HttpTransportPort, ResponseKind, TransferResponse};
