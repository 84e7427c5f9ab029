//! HTTP plumbing shared by the fetchers.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::FetchError;

/// Issues a GET request and returns the response body.
///
/// Implementations report every failure to complete the request, including
/// timeouts and non-success statuses, as [`FetchError::NetworkFailure`].
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Fetch `url` with the given query parameters.
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client that gives up on any request after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("etaboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}
