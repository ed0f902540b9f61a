//! Upstream IP geolocation providers
//!
//! ipapi.co is asked first; ip-api.com is the fallback. Each request is
//! bounded by the configured timeout. When both fail the caller gets the
//! "unavailable" shape instead of an error.

use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

use crate::data::IpLocationResponse;

/// Errors from a single upstream provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed or returned a non-2xx status
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Provider endpoints and limits
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the primary provider
    pub ipapi_base_url: String,
    /// Base URL of the fallback provider
    pub ip_api_base_url: String,
    /// Timeout applied to each provider request
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            ipapi_base_url: "https://ipapi.co".to_string(),
            ip_api_base_url: "http://ip-api.com".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

/// ipapi.co response (only the fields we use)
#[derive(Debug, Deserialize)]
struct IpapiResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<String>,
    country_name: Option<String>,
}

/// ip-api.com response (only the fields we use)
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
    country: Option<String>,
}

/// Whether an address should be looked up as "whoever is calling"
///
/// Loopback and the 10.x / 192.168.x private ranges carry no location, so for
/// those the providers are asked about the server's own public address.
pub fn is_local_address(ip: &IpAddr) -> bool {
    if ip.is_loopback() {
        return true;
    }
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            a == 10 || (a == 192 && b == 168)
        }
        IpAddr::V6(_) => false,
    }
}

/// Two-provider IP geolocation lookup
#[derive(Debug, Clone)]
pub struct UpstreamLookup {
    client: Client,
    config: UpstreamConfig,
}

impl UpstreamLookup {
    /// Creates a lookup with the given providers
    ///
    /// # Errors
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Resolves `client_ip`, falling back from the primary to the secondary provider
    pub async fn lookup(&self, client_ip: Option<IpAddr>) -> IpLocationResponse {
        let target = client_ip.filter(|ip| !is_local_address(ip));

        match self.query_ipapi(target).await {
            Ok(Some(found)) => {
                tracing::info!(provider = "ipapi.co", city = ?found.city, "IP geolocation succeeded");
                return found;
            }
            Ok(None) => tracing::warn!(provider = "ipapi.co", "no coordinates in response"),
            Err(e) => tracing::warn!(provider = "ipapi.co", error = %e, "IP geolocation failed"),
        }

        match self.query_ip_api(target).await {
            Ok(Some(found)) => {
                tracing::info!(provider = "ip-api.com", city = ?found.city, "IP geolocation succeeded");
                return found;
            }
            Ok(None) => tracing::warn!(provider = "ip-api.com", "lookup status was not success"),
            Err(e) => tracing::warn!(provider = "ip-api.com", error = %e, "IP geolocation failed"),
        }

        tracing::error!(client_ip = ?client_ip, "all IP geolocation providers failed");
        IpLocationResponse::unavailable()
    }

    async fn get_text(&self, url: &str, user_agent: Option<&str>) -> Result<String, ProviderError> {
        let mut request = self.client.get(url);
        if let Some(user_agent) = user_agent {
            request = request.header(reqwest::header::USER_AGENT, user_agent);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn query_ipapi(
        &self,
        target: Option<IpAddr>,
    ) -> Result<Option<IpLocationResponse>, ProviderError> {
        let base = self.config.ipapi_base_url.trim_end_matches('/');
        let url = match target {
            Some(ip) => format!("{}/{}/json/", base, ip),
            None => format!("{}/json/", base),
        };

        let text = self.get_text(&url, Some("Mozilla/5.0")).await?;
        let body: IpapiResponse = serde_json::from_str(&text)?;

        // A zero latitude is how ipapi.co reports "not found" for reserved ranges
        match body.latitude {
            Some(latitude) if latitude != 0.0 => Ok(Some(IpLocationResponse {
                latitude: Some(latitude),
                longitude: body.longitude,
                city: body.city,
                country: body.country_name,
                error: None,
            })),
            _ => Ok(None),
        }
    }

    async fn query_ip_api(
        &self,
        target: Option<IpAddr>,
    ) -> Result<Option<IpLocationResponse>, ProviderError> {
        let base = self.config.ip_api_base_url.trim_end_matches('/');
        let url = match target {
            Some(ip) => format!("{}/json/{}", base, ip),
            None => format!("{}/json", base),
        };

        let text = self.get_text(&url, None).await?;
        let body: IpApiResponse = serde_json::from_str(&text)?;

        if body.status != "success" {
            return Ok(None);
        }
        Ok(Some(IpLocationResponse {
            latitude: body.lat,
            longitude: body.lon,
            city: body.city,
            country: body.country,
            error: None,
        }))
    }
}
