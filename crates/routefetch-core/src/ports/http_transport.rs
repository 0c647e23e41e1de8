//! HTTP transport port.
//!
//! The engine never speaks HTTP itself. It asks a transport for one exchange
//! (optionally starting at a byte offset) and consumes the body as a stream of
//! chunks, so tests can substitute a counting fake and production uses reqwest.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use url::Url;

use crate::download::DownloadError;

/// Body of a transfer, yielded chunk by chunk.
pub type BodyStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// How the server answered a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    /// The whole resource, starting at byte 0 (HTTP 200).
    Full,
    /// The requested suffix, starting at the requested offset (HTTP 206).
    Partial,
    /// The requested offset lies at or beyond the end of the resource (HTTP 416).
    RangeNotSatisfiable,
}

/// One HTTP exchange whose body has not been consumed yet.
pub struct TransferResponse {
    /// Full, partial, or unsatisfiable.
    pub kind: ResponseKind,
    /// Length of this response's body, if the server declared it.
    pub content_length: Option<u64>,
    /// Length of the complete resource, if derivable (e.g. from `Content-Range`).
    pub total_length: Option<u64>,
    /// Body chunks.
    pub body: BodyStream,
}

impl TransferResponse {
    /// Best known size of the complete resource.
    #[must_use]
    pub fn resource_length(&self, offset: u64) -> Option<u64> {
        self.total_length.or_else(|| match self.kind {
            ResponseKind::Full => self.content_length,
            ResponseKind::Partial => self.content_length.map(|len| len + offset),
            ResponseKind::RangeNotSatisfiable => None,
        })
    }
}

impl std::fmt::Debug for TransferResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferResponse")
            .field("kind", &self.kind)
            .field("content_length", &self.content_length)
            .field("total_length", &self.total_length)
            .finish_non_exhaustive()
    }
}

/// Port for performing HTTP GET requests with optional byte ranges.
///
/// Implementations map failures onto the engine's error kinds:
/// - DNS, refused, connect timeout: [`DownloadError::Connection`]
/// - non-success status (other than 416 on a ranged request): [`DownloadError::HttpStatus`]
/// - errors while reading the body: [`DownloadError::Transport`]
#[async_trait]
pub trait HttpTransportPort: Send + Sync {
    /// Open `url`, requesting bytes from `offset` to the end when `offset > 0`.
    async fn open(&self, url: &Url, offset: u64) -> Result<TransferResponse, DownloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn response(kind: ResponseKind, content_length: Option<u64>) -> TransferResponse {
        TransferResponse {
            kind,
            content_length,
            total_length: None,
            body: Box::pin(stream::empty()),
        }
    }

    #[test]
    fn test_resource_length_full() {
        assert_eq!(response(ResponseKind::Full, Some(447)).resource_length(0), Some(447));
    }

    #[test]
    fn test_resource_length_partial_adds_offset() {
        assert_eq!(
            response(ResponseKind::Partial, Some(421)).resource_length(26),
            Some(447)
        );
    }

    #[test]
    fn test_resource_length_prefers_total() {
        let mut resp = response(ResponseKind::Partial, Some(421));
        resp.total_length = Some(500);
        assert_eq!(resp.resource_length(26), Some(500));
        assert_eq!(response(ResponseKind::RangeNotSatisfiable, None).resource_length(9), None);
    }
}
