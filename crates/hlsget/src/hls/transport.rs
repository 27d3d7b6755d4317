// HTTP transport seam: the pipeline only ever asks "fetch(url) -> status + bytes".

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::hls::HlsDownloaderError;
use crate::{DownloadError, DownloaderConfig, create_client};

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Fetch a whole resource into memory. Non-success statuses are returned, not raised.
    async fn fetch(&self, url: &str) -> Result<TransportResponse, HlsDownloaderError>;

    /// Fetch a resource into `sink`. The body is only written for `200 OK`.
    async fn fetch_to_writer(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<StatusCode, HlsDownloaderError> {
        let response = self.fetch(url).await?;
        if response.status == StatusCode::OK {
            sink.write_all(&response.body).await?;
            sink.flush().await?;
        }
        Ok(response.status)
    }
}

/// Transport backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        Ok(Self::new(create_client(config)?))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, HlsDownloaderError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        trace!(url, %status, len = body.len(), "Fetched resource");
        Ok(TransportResponse { status, body })
    }

    async fn fetch_to_writer(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<StatusCode, HlsDownloaderError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Ok(status);
        }

        let mut written = 0usize;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
            written += chunk.len();
        }
        sink.flush().await?;
        trace!(url, %status, written, "Streamed resource to writer");
        Ok(status)
    }
}
