//! reqwest-backed HTTP transport.

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use reqwest::header::{CONTENT_RANGE, HeaderMap, RANGE};
use reqwest::{Client, StatusCode};
use url::Url;

use routefetch_core::download::DownloadError;
use routefetch_core::ports::{
    DownloadManagerConfig, HttpTransportPort, ResponseKind, TransferResponse,
};

/// Default transport: plain GET with an optional `Range` header.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client from the manager configuration.
    pub fn new(config: &DownloadManagerConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DownloadError::connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransportPort for ReqwestTransport {
    async fn open(&self, url: &Url, offset: u64) -> Result<TransferResponse, DownloadError> {
        let mut request = self.client.get(url.clone());
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = request.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                "timed out"
            } else if e.is_connect() {
                "connect failed"
            } else {
                "request failed"
            };
            DownloadError::connection(format!("{kind}: {url}: {e}"))
        })?;

        let status = response.status();
        let total_length = total_from_content_range(response.headers());

        if status == StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
            return Ok(TransferResponse {
                kind: ResponseKind::RangeNotSatisfiable,
                content_length: None,
                total_length,
                body: stream::empty().boxed(),
            });
        }

        if !status.is_success() {
            return Err(DownloadError::http_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let kind = if status == StatusCode::PARTIAL_CONTENT {
            ResponseKind::Partial
        } else {
            ResponseKind::Full
        };

        tracing::debug!(
            target: "routefetch.download",
            %url,
            status = status.as_u16(),
            offset,
            content_length = ?response.content_length(),
            "Response received"
        );

        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| DownloadError::transport(e.to_string(), 0)))
            .boxed();

        Ok(TransferResponse {
            kind,
            content_length,
            total_length,
            body,
        })
    }
}

/// Parse the complete length out of `Content-Range: bytes a-b/total`.
fn total_from_content_range(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}
