//! Transfer execution.
//!
//! One HTTP exchange per download: open (optionally ranged) and then stream
//! the body straight to disk. Opening and streaming are separate steps so the
//! worker can publish `Downloading` between them.
//!
//! # Range handling
//!
//! | Asked for | Server answered | Result |
//! |-----------|-----------------|--------|
//! | offset 0  | 200             | write from 0 |
//! | offset n  | 206             | append from n |
//! | offset n  | 200             | discard local bytes, write from 0 |
//! | offset n  | 416             | discard local file, reopen once from 0 |

mod http;

pub use http::ReqwestTransport;

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use url::Url;

use routefetch_core::download::DownloadError;
use routefetch_core::ports::{HttpTransportPort, ResponseKind, TransferResponse};

/// Reason attached to transfers interrupted by shutdown.
pub const DISPOSED_REASON: &str = "manager disposed";

/// Write buffer in front of the output file.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// An opened transfer whose body has not been consumed.
#[derive(Debug)]
pub struct OpenTransfer {
    response: TransferResponse,
    path: PathBuf,
    start_at: u64,
    total: Option<u64>,
}

impl OpenTransfer {
    /// Offset the body will be written at (0 for a fresh write).
    pub const fn start_at(&self) -> u64 {
        self.start_at
    }

    /// Size of the complete resource, if known.
    pub const fn total(&self) -> Option<u64> {
        self.total
    }
}

/// Outcome of a streamed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Bytes written during this exchange.
    pub bytes_written: u64,
    /// Length of the file afterwards.
    pub file_len: u64,
}

/// Performs one transfer for one download.
pub struct TransferExecutor<'a> {
    transport: &'a dyn HttpTransportPort,
    cancel: &'a CancellationToken,
    read_timeout: Duration,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(
        transport: &'a dyn HttpTransportPort,
        cancel: &'a CancellationToken,
        read_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            cancel,
            read_timeout,
        }
    }

    /// Open `url` for writing into `path`, resuming at `offset` when possible.
    pub async fn open(
        &self,
        url: &Url,
        path: &Path,
        offset: u64,
    ) -> Result<OpenTransfer, DownloadError> {
        let response = self.request(url, offset).await?;

        let (response, offset) = if response.kind == ResponseKind::RangeNotSatisfiable {
            tracing::debug!(
                target: "routefetch.download",
                %url,
                offset,
                "Range not satisfiable, restarting from zero"
            );
            remove_if_exists(path).await?;
            let retry = self.request(url, 0).await?;
            if retry.kind == ResponseKind::RangeNotSatisfiable {
                return Err(DownloadError::http_status(416, "Range Not Satisfiable"));
            }
            (retry, 0)
        } else {
            (response, offset)
        };

        let start_at = match response.kind {
            ResponseKind::Partial => offset,
            _ => {
                if offset > 0 {
                    tracing::debug!(
                        target: "routefetch.download",
                        %url,
                        offset,
                        "Server ignored range request, restarting from zero"
                    );
                }
                0
            }
        };
        let total = response.resource_length(start_at);

        Ok(OpenTransfer {
            response,
            path: path.to_path_buf(),
            start_at,
            total,
        })
    }

    /// Stream the body to disk.
    ///
    /// `on_progress(file_len, total)` is called after every chunk, with
    /// `total` 0 when unknown. On a transport error or cancellation the bytes
    /// already written are flushed and kept.
    pub async fn stream(
        &self,
        transfer: OpenTransfer,
        mut on_progress: impl FnMut(u64, u64) + Send,
    ) -> Result<TransferOutcome, DownloadError> {
        let OpenTransfer {
            response,
            path,
            start_at,
            total,
        } = transfer;

        let file = if start_at > 0 {
            OpenOptions::new().append(true).open(&path).await
        } else {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .await
        }
        .map_err(|e| DownloadError::from_io_error(&e))?;

        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let mut body = response.body;
        let mut written: u64 = 0;
        let total_hint = total.unwrap_or(0);

        let result = loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    break Err(DownloadError::cancelled(DISPOSED_REASON));
                }
                next = tokio::time::timeout(self.read_timeout, body.next()) => next,
            };

            match next {
                Err(_) => {
                    break Err(DownloadError::transport(
                        format!("no data for {}s", self.read_timeout.as_secs_f32()),
                        written,
                    ));
                }
                Ok(None) => break Ok(()),
                Ok(Some(Err(e))) => break Err(with_bytes_written(e, written)),
                Ok(Some(Ok(chunk))) => {
                    if let Err(e) = writer.write_all(&chunk).await {
                        break Err(DownloadError::from_io_error(&e));
                    }
                    written += chunk.len() as u64;
                    on_progress(start_at + written, total_hint);
                }
            }
        };

        // Keep whatever arrived; it is the basis for a later resume.
        let flushed = writer.flush().await;
        let file = writer.into_inner();
        result?;
        flushed.map_err(|e| DownloadError::from_io_error(&e))?;
        file.sync_all()
            .await
            .map_err(|e| DownloadError::from_io_error(&e))?;

        Ok(TransferOutcome {
            bytes_written: written,
            file_len: start_at + written,
        })
    }

    /// Send one request and wait for its headers, bounded by the read timeout.
    async fn request(&self, url: &Url, offset: u64) -> Result<TransferResponse, DownloadError> {
        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(DownloadError::cancelled(DISPOSED_REASON)),
            response = tokio::time::timeout(self.read_timeout, self.transport.open(url, offset)) => response,
        };
        response.unwrap_or_else(|_| {
            Err(DownloadError::connection(format!(
                "timed out: no response from {url} within {}s",
                self.read_timeout.as_secs_f32()
            )))
        })
    }
}

/// Re-stamp a body error with the number of bytes this exchange wrote.
fn with_bytes_written(error: DownloadError, written: u64) -> DownloadError {
    match error {
        DownloadError::Transport { message, .. } => DownloadError::transport(message, written),
        other => other,
    }
}

/// Delete a file, treating "already gone" as success.
pub(crate) async fn remove_if_exists(path: &Path) -> Result<(), DownloadError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DownloadError::from_io_error(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;
    use std::sync::Mutex;

    /// Serves a fixed resource, optionally ignoring ranges.
    struct FixedTransport {
        content: &'static [u8],
        honor_ranges: bool,
        requests: Mutex<Vec<u64>>,
    }

    impl FixedTransport {
        fn new(content: &'static [u8], honor_ranges: bool) -> Self {
            Self {
                content,
                honor_ranges,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpTransportPort for FixedTransport {
        async fn open(&self, _url: &Url, offset: u64) -> Result<TransferResponse, DownloadError> {
            self.requests.lock().unwrap().push(offset);
            let len = self.content.len() as u64;
            if offset > 0 && self.honor_ranges && offset >= len {
                return Ok(TransferResponse {
                    kind: ResponseKind::RangeNotSatisfiable,
                    content_length: None,
                    total_length: Some(len),
                    body: Box::pin(stream::empty()),
                });
            }
            let content: &'static [u8] = self.content;
            let (kind, body) = if offset > 0 && self.honor_ranges {
                (ResponseKind::Partial, &content[usize::try_from(offset).unwrap()..])
            } else {
                (ResponseKind::Full, content)
            };
            let chunks: Vec<Result<Bytes, DownloadError>> = body
                .chunks(4)
                .map(|c| Ok(Bytes::from_static(c)))
                .collect();
            Ok(TransferResponse {
                kind,
                content_length: Some(body.len() as u64),
                total_length: None,
                body: Box::pin(stream::iter(chunks)),
            })
        }
    }

    const CONTENT: &[u8] = b"0123456789abcdefghij";

    fn url() -> Url {
        Url::parse("http://localhost/resource").unwrap()
    }

    #[tokio::test]
    async fn test_fresh_transfer_writes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let transport = FixedTransport::new(CONTENT, true);
        let cancel = CancellationToken::new();
        let executor = TransferExecutor::new(&transport, &cancel, Duration::from_secs(5));

        let open = executor.open(&url(), &path, 0).await.unwrap();
        assert_eq!(open.start_at(), 0);
        assert_eq!(open.total(), Some(CONTENT.len() as u64));

        let mut last = (0, 0);
        let outcome = executor
            .stream(open, |done, total| last = (done, total))
            .await
            .unwrap();

        assert_eq!(outcome.file_len, CONTENT.len() as u64);
        assert_eq!(last, (20, 20));
        assert_eq!(std::fs::read(&path).unwrap(), CONTENT);
    }

    #[tokio::test]
    async fn test_resume_appends_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, &CONTENT[..7]).unwrap();

        let transport = FixedTransport::new(CONTENT, true);
        let cancel = CancellationToken::new();
        let executor = TransferExecutor::new(&transport, &cancel, Duration::from_secs(5));

        let open = executor.open(&url(), &path, 7).await.unwrap();
        assert_eq!(open.start_at(), 7);
        let outcome = executor.stream(open, |_, _| {}).await.unwrap();

        assert_eq!(outcome.bytes_written, 13);
        assert_eq!(std::fs::read(&path).unwrap(), CONTENT);
        assert_eq!(*transport.requests.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_ignored_range_restarts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"garbage").unwrap();

        let transport = FixedTransport::new(CONTENT, false);
        let cancel = CancellationToken::new();
        let executor = TransferExecutor::new(&transport, &cancel, Duration::from_secs(5));

        let open = executor.open(&url(), &path, 7).await.unwrap();
        assert_eq!(open.start_at(), 0);
        executor.stream(open, |_, _| {}).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), CONTENT);
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_retries_once_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"0123456789abcdefghij-and-more").unwrap();

        let transport = FixedTransport::new(CONTENT, true);
        let cancel = CancellationToken::new();
        let executor = TransferExecutor::new(&transport, &cancel, Duration::from_secs(5));

        let open = executor.open(&url(), &path, 29).await.unwrap();
        executor.stream(open, |_, _| {}).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), CONTENT);
        assert_eq!(*transport.requests.lock().unwrap(), vec![29, 0]);
    }

    #[tokio::test]
    async fn test_body_error_keeps_partial_and_counts_bytes() {
        struct Broken;

        #[async_trait]
        impl HttpTransportPort for Broken {
            async fn open(&self, _url: &Url, _offset: u64) -> Result<TransferResponse, DownloadError> {
                let chunks: Vec<Result<Bytes, DownloadError>> = vec![
                    Ok(Bytes::from_static(b"abcd")),
                    Err(DownloadError::transport("connection reset", 0)),
                ];
                Ok(TransferResponse {
                    kind: ResponseKind::Full,
                    content_length: Some(100),
                    total_length: None,
                    body: Box::pin(stream::iter(chunks)),
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let cancel = CancellationToken::new();
        let executor = TransferExecutor::new(&Broken, &cancel, Duration::from_secs(5));

        let open = executor.open(&url(), &path, 0).await.unwrap();
        let err = executor.stream(open, |_, _| {}).await.unwrap_err();

        assert_eq!(err, DownloadError::transport("connection reset", 4));
        assert_eq!(std::fs::read(&path).unwrap(), b"abcd");
    }

    mockall::mock! {
        Transport {}

        #[async_trait]
        impl HttpTransportPort for Transport {
            async fn open(&self, url: &Url, offset: u64) -> Result<TransferResponse, DownloadError>;
        }
    }

    fn unsatisfiable() -> TransferResponse {
        TransferResponse {
            kind: ResponseKind::RangeNotSatisfiable,
            content_length: None,
            total_length: None,
            body: Box::pin(stream::empty()),
        }
    }

    #[tokio::test]
    async fn test_repeated_unsatisfiable_range_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"stale").unwrap();

        let mut transport = MockTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_open()
            .withf(|_, offset| *offset == 5)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(unsatisfiable()));
        transport
            .expect_open()
            .withf(|_, offset| *offset == 0)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(unsatisfiable()));

        let cancel = CancellationToken::new();
        let executor = TransferExecutor::new(&transport, &cancel, Duration::from_secs(5));
        let err = executor.open(&url(), &path, 5).await.unwrap_err();

        assert!(matches!(err, DownloadError::HttpStatus { status: 416, .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_connection_error_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"partial").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_open()
            .times(1)
            .returning(|url, _| Err(DownloadError::connection(format!("connect failed: {url}"))));

        let cancel = CancellationToken::new();
        let executor = TransferExecutor::new(&transport, &cancel, Duration::from_secs(5));
        let err = executor.open(&url(), &path, 7).await.unwrap_err();

        assert!(matches!(err, DownloadError::Connection { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"partial");
    }

    #[tokio::test]
    async fn test_silent_server_times_out_as_connection_error() {
        struct Silent;

        #[async_trait]
        impl HttpTransportPort for Silent {
            async fn open(&self, _url: &Url, _offset: u64) -> Result<TransferResponse, DownloadError> {
                std::future::pending().await
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let executor = TransferExecutor::new(&Silent, &cancel, Duration::from_millis(50));

        let err = executor
            .open(&url(), &dir.path().join("out.bin"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Connection { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancelled_before_open() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FixedTransport::new(CONTENT, true);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let executor = TransferExecutor::new(&transport, &cancel, Duration::from_secs(5));

        let err = executor
            .open(&url(), &dir.path().join("out.bin"), 0)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(transport.requests.lock().unwrap().is_empty());
    }
}
