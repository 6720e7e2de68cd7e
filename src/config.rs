//! Detector configuration
//!
//! Timeouts, server lists and endpoints used by the tiers. Defaults are
//! compiled-in constant tables; a JSON file can override any subset of them.

use crate::detection::http_ip::{API_TIMEOUT, DEFAULT_API_URLS};
use crate::detection::natpmp::NATPMP_TIMEOUT;
use crate::detection::pcp::PCP_TIMEOUT;
use crate::detection::stun::STUN_TIMEOUT;
use crate::detection::upnp::SSDP_TIMEOUT;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

/// Public STUN servers, tried in order
pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun.l.google.com:19302",
    "stun1.l.google.com:19302",
    "stun.cloudflare.com:3478",
    "stun.nextcloud.com:443",
];

/// Configuration of a [`Detector`](crate::detection::Detector)
///
/// # Example
/// ```rust,no_run
/// use pubip::DetectorConfig;
///
/// // Missing file yields the defaults
/// let config = DetectorConfig::load("pubip.json").expect("Failed to load");
/// println!("STUN servers: {:?}", config.stun_servers);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DetectorConfig {
    /// STUN servers as `host:port`
    pub stun_servers: Vec<String>,
    /// Per-server STUN timeout in milliseconds
    pub stun_timeout_ms: u64,
    /// NAT-PMP timeout in milliseconds
    pub natpmp_timeout_ms: u64,
    /// PCP timeout in milliseconds
    pub pcp_timeout_ms: u64,
    /// SSDP discovery timeout in milliseconds
    pub ssdp_timeout_ms: u64,
    /// HTTP fallback services, tried in order
    pub api_urls: Vec<String>,
    /// HTTP fallback timeout in milliseconds
    pub api_timeout_ms: u64,
    /// Gateway to query instead of the system default route
    pub gateway: Option<Ipv4Addr>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            stun_servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            stun_timeout_ms: STUN_TIMEOUT.as_millis() as u64,
            natpmp_timeout_ms: NATPMP_TIMEOUT.as_millis() as u64,
            pcp_timeout_ms: PCP_TIMEOUT.as_millis() as u64,
            ssdp_timeout_ms: SSDP_TIMEOUT.as_millis() as u64,
            api_urls: DEFAULT_API_URLS.iter().map(|s| s.to_string()).collect(),
            api_timeout_ms: API_TIMEOUT.as_millis() as u64,
            gateway: None,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from a JSON file
    ///
    /// Returns the defaults if the file does not exist or is empty. Keys
    /// missing from the file keep their default values. Read failures are
    /// reported as [`Error::Io`], bad contents as [`Error::Config`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        Ok(())
    }

    /// Reject values the tiers cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.stun_servers.is_empty() {
            return Err(Error::Config("At least one STUN server is required".to_string()));
        }

        if let Some(server) = self.stun_servers.iter().find(|s| !s.contains(':')) {
            return Err(Error::Config(format!(
                "STUN server '{}' must be in host:port form",
                server
            )));
        }

        let timeouts = [
            ("stun_timeout_ms", self.stun_timeout_ms),
            ("natpmp_timeout_ms", self.natpmp_timeout_ms),
            ("pcp_timeout_ms", self.pcp_timeout_ms),
            ("ssdp_timeout_ms", self.ssdp_timeout_ms),
            ("api_timeout_ms", self.api_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(Error::Config(format!("{} must be greater than zero", name)));
        }

        if self.api_urls.is_empty() {
            return Err(Error::Config("At least one API URL is required".to_string()));
        }

        if self.api_urls.iter().any(|url| url.trim().is_empty()) {
            return Err(Error::Config("API URLs must not be empty".to_string()));
        }

        Ok(())
    }

    /// STUN per-server timeout
    pub fn stun_timeout(&self) -> Duration {
        Duration::from_millis(self.stun_timeout_ms)
    }

    /// NAT-PMP timeout
    pub fn natpmp_timeout(&self) -> Duration {
        Duration::from_millis(self.natpmp_timeout_ms)
    }

    /// PCP timeout
    pub fn pcp_timeout(&self) -> Duration {
        Duration::from_millis(self.pcp_timeout_ms)
    }

    /// SSDP discovery timeout
    pub fn ssdp_timeout(&self) -> Duration {
        Duration::from_millis(self.ssdp_timeout_ms)
    }

    /// HTTP fallback timeout
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }
}
