//! HTTP-based external IP detection
//!
//! Last-resort tier used only by the `Full` strategy. It asks a public "what
//! is my IP" service, which means trusting that third party, so every
//! cheaper tier runs first.

use super::types::{IpResult, IpSource, Probe, ProbeError};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default public IP services, tried in order (JSON bodies)
pub const DEFAULT_API_URLS: &[&str] = &[
    "https://api.ipify.org?format=json",
    "https://api4.ipify.org?format=json",
    "https://api64.ipify.org?format=json",
];

/// Default timeout for the HTTP request
pub const API_TIMEOUT: Duration = Duration::from_secs(5);

/// Capability to fetch the public address from an HTTP service
pub trait ApiClient: Send + Sync {
    /// Query `url` and report the address it returns
    fn fetch_public_ip(&self, url: &str) -> IpResult;
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ip: String,
}

/// Parse a service reply: either a bare address or `{"ip": "..."}`
pub fn parse_api_body(body: &str) -> Result<IpAddr, ProbeError> {
    let body = body.trim();

    if let Ok(ip) = body.parse::<IpAddr>() {
        return Ok(ip);
    }

    let reply: ApiReply = serde_json::from_str(body)
        .map_err(|_| ProbeError::Http(format!("Unrecognized response body: {:.64}", body)))?;

    reply
        .ip
        .trim()
        .parse()
        .map_err(|_| ProbeError::Http(format!("Invalid IP in response: {}", reply.ip)))
}

/// [`ApiClient`] backed by a blocking `reqwest` client
///
/// A client is built per request, so no connection state outlives a
/// discovery call.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    timeout: Duration,
}

impl HttpApiClient {
    /// Create a client with the given request timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn fetch(&self, url: &str) -> Result<IpAddr, ProbeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProbeError::Http(format!("Failed to create HTTP client: {}", e)))?;

        let body = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|e| ProbeError::Http(format!("{}: {}", url, e)))?;

        parse_api_body(&body)
    }
}

impl Default for HttpApiClient {
    fn default() -> Self {
        Self::new(API_TIMEOUT)
    }
}

impl ApiClient for HttpApiClient {
    fn fetch_public_ip(&self, url: &str) -> IpResult {
        debug!("Trying IP detection service: {}", url);

        match self.fetch(url) {
            Ok(ip) => {
                info!("External IP detected via HTTP: {} (from {})", ip, url);
                IpResult::found(ip, IpSource::API)
            }
            Err(e) => {
                debug!("Failed to query {}: {}", url, e);
                IpResult::from_error(&e)
            }
        }
    }
}

/// Tier adapter invoking an [`ApiClient`] over an ordered endpoint list
///
/// The first endpoint that yields an address wins; otherwise the last
/// failure is reported.
pub struct ApiProbe {
    client: Box<dyn ApiClient>,
    urls: Vec<String>,
}

impl ApiProbe {
    /// Create the tier from a client and the service URLs
    pub fn new(client: Box<dyn ApiClient>, urls: Vec<String>) -> Self {
        Self { client, urls }
    }

    /// URLs the tier queries, in order
    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

impl Probe for ApiProbe {
    fn name(&self) -> &'static str {
        "HTTP API"
    }

    fn probe(&self) -> IpResult {
        let mut last_failure = None;

        for url in &self.urls {
            let result = self.client.fetch_public_ip(url);
            if result.is_success() {
                return result;
            }
            warn!("Endpoint {} failed: {}", url, result.error());
            last_failure = Some(result);
        }

        last_failure.unwrap_or_else(|| IpResult::failed("No API endpoints configured"))
    }
}
