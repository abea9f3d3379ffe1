//! HTTP client with bounded timeouts and status error handling.

use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use std::io::Write;
use std::time::Duration;

/// Connect timeout for every request.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum idle time between two reads of a response.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A non-2xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpStatusError {
    pub status: u16,
}

impl std::fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP status {}", self.status)
    }
}

impl std::error::Error for HttpStatusError {}

/// Thin wrapper over a reqwest `Client` used for the version check and
/// artifact transfers.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client with the standard connect/read timeouts.
    pub fn with_default_timeouts(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }

    /// Performs a GET request and returns the response body as text.
    ///
    /// A non-2xx response yields an error that downcasts to [`HttpStatusError`].
    #[tracing::instrument(skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}...", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpStatusError {
                status: status.as_u16(),
            }
            .into());
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }

    /// Downloads a file from a URL, streaming it into the writer returned by
    /// `create_writer`.
    ///
    /// `on_progress` receives the bytes written so far and the total size when
    /// the server announced one. The writer is only created once the server
    /// answered with a success status.
    #[tracing::instrument(skip(self, create_writer, on_progress))]
    pub async fn download_file<W, F, P>(
        &self,
        url: &str,
        create_writer: F,
        mut on_progress: P,
    ) -> Result<u64>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
        P: FnMut(u64, Option<u64>),
    {
        debug!("Downloading file from {}...", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpStatusError {
                status: status.as_u16(),
            }
            .into());
        }

        let total = response.content_length();
        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;
        on_progress(downloaded_bytes, total);

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
            on_progress(downloaded_bytes, total);
        }
        writer.flush().context("Failed to flush downloaded file")?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }
}
