//! Client for the same-origin IP lookup endpoint
//!
//! The endpoint answers with a best-effort estimate derived from the caller's
//! network address. Every failure here is soft: callers log it and carry on.

use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;

use super::IpLocationResponse;

/// Errors that can occur when querying the IP lookup endpoint
#[derive(Debug, Error)]
pub enum IpLookupError {
    /// HTTP request failed or returned a non-2xx status
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The configured endpoint is not a valid URL
    #[error("Invalid endpoint URL '{0}'")]
    InvalidEndpoint(String),
}

/// Client for the IP lookup endpoint
#[derive(Debug, Clone)]
pub struct IpLocationClient {
    client: Client,
    endpoint: Url,
}

impl IpLocationClient {
    /// Creates a client for `endpoint` with a per-request timeout
    ///
    /// # Errors
    /// * `IpLookupError::InvalidEndpoint` if `endpoint` does not parse
    /// * `IpLookupError::RequestFailed` if the HTTP client cannot be built
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, IpLookupError> {
        let endpoint =
            Url::parse(endpoint).map_err(|_| IpLookupError::InvalidEndpoint(endpoint.to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    /// The URL this client queries
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetches the current estimate
    ///
    /// An `Ok` response may still be the "unavailable" shape; use
    /// [`IpLocationResponse::coordinate`] to tell the two apart.
    pub async fn fetch_ip_location(&self) -> Result<IpLocationResponse, IpLookupError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        let body: IpLocationResponse = serde_json::from_str(&text)?;
        Ok(body)
    }
}
