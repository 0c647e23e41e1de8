//! Shared fixtures for the download engine integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use url::Url;
use zip::write::SimpleFileOptions;

use routefetch_core::ports::{BroadcastEmitter, ResponseKind, TransferResponse};
use routefetch_download::{
    DownloadError, DownloadManagerConfig, DownloadManagerDeps, DownloadManagerImpl,
    HttpTransportPort, ReqwestTransport,
};

pub const CONTENT: &[u8] = b"The quick brown fox jumps over the lazy dog";
pub const CONTENT_SHA1: &str = "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12";
pub const CONTENT_SHA256: &str =
    "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592";

/// Generous bound for a single download in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Config with short network timeouts.
pub fn test_config() -> DownloadManagerConfig {
    DownloadManagerConfig::default()
        .with_connect_timeout(Duration::from_secs(2))
        .with_read_timeout(Duration::from_secs(5))
        .with_progress_interval(Duration::ZERO)
}

/// Start a manager that talks real HTTP.
pub fn start_http(config: DownloadManagerConfig) -> (Arc<DownloadManagerImpl>, BroadcastEmitter) {
    let transport = ReqwestTransport::new(&config).expect("client builds");
    start_with(Arc::new(transport), config)
}

/// Start a manager over any transport.
pub fn start_with<T: HttpTransportPort + 'static>(
    transport: Arc<T>,
    config: DownloadManagerConfig,
) -> (Arc<DownloadManagerImpl>, BroadcastEmitter) {
    let emitter = BroadcastEmitter::new();
    let manager = DownloadManagerImpl::start(DownloadManagerDeps {
        transport,
        event_emitter: Arc::new(emitter.clone()),
        config,
    });
    (manager, emitter)
}

/// A local address with nothing listening on it.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/nothing-here")
}

/// A local server that accepts connections and never answers.
///
/// Accepted sockets are held until the returned task is dropped or aborted.
pub async fn silent_server_url() -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    (format!("http://127.0.0.1:{port}/silent"), task)
}

/// Build a zip archive in memory.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(contents).expect("write entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Serves `CONTENT` (honouring ranges), counting opens and tracking how many
/// are in flight at once.
#[derive(Default)]
pub struct CountingTransport {
    opens: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl CountingTransport {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransportPort for CountingTransport {
    async fn open(&self, _url: &Url, offset: u64) -> Result<TransferResponse, DownloadError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let start = usize::try_from(offset).expect("small offset");
        let content: &'static [u8] = CONTENT;
        let (kind, body) = if start > 0 {
            (ResponseKind::Partial, &content[start..])
        } else {
            (ResponseKind::Full, content)
        };
        Ok(TransferResponse {
            kind,
            content_length: Some(body.len() as u64),
            total_length: Some(content.len() as u64),
            body: stream::iter(vec![Ok(Bytes::from_static(body))]).boxed(),
        })
    }
}

/// Sends one chunk and then never finishes.
pub struct StallingTransport;

pub const STALL_CHUNK: &[u8] = b"first chunk";

#[async_trait]
impl HttpTransportPort for StallingTransport {
    async fn open(&self, _url: &Url, _offset: u64) -> Result<TransferResponse, DownloadError> {
        Ok(TransferResponse {
            kind: ResponseKind::Full,
            content_length: Some(1024),
            total_length: None,
            body: stream::iter(vec![Ok(Bytes::from_static(STALL_CHUNK))])
                .chain(stream::pending())
                .boxed(),
        })
    }
}
