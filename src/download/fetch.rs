//! The network seam of the downloader.
//!
//! [`Fetch`] opens a URL and hands back its body as a stream of byte chunks.
//! [`HttpFetcher`] is the production implementation over `reqwest`; tests
//! substitute fetchers that count concurrent requests or fail mid-body.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use tracing::debug;

use crate::error::DownloadError;

/// A response body, chunk by chunk.
pub type ChunkStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// Opens a URL for streaming.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Start the request. Non-success statuses are reported here, before
    /// any body bytes are produced.
    async fn open(&self, url: &str) -> Result<ChunkStream, DownloadError>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn open(&self, url: &str) -> Result<ChunkStream, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        debug!(
            "GET {} → {} ({:?} bytes)",
            url,
            status,
            response.content_length()
        );

        let owned_url = url.to_string();
        Ok(response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| transport(&owned_url, &e)))
            .boxed())
    }
}

fn transport(url: &str, e: &reqwest::Error) -> DownloadError {
    DownloadError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    }
}
