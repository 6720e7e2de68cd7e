//! pubip - tiered public IP address discovery
//!
//! This library finds the address a host presents to the internet. It asks
//! the cheapest source first (local IPv6 interfaces, then the gateway over
//! NAT-PMP, PCP and UPnP) and only falls back to public STUN servers or an
//! HTTP service when the caller's strategy allows it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod detection;

pub use config::DetectorConfig;
pub use detection::{
    format_result, AddressFamily, CompletionContext, CompletionJob, DetectionRequest, Detector,
    Inline, IpResult, IpSource, OutputFormat, ProbeError, Strategy,
};

/// Result type alias for pubip operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pubip operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

/// Initialize logging with the default subscriber
pub fn init() {
    tracing_subscriber::fmt::init();
}

/// Initialize logging at a fixed maximum level
///
/// Log lines go to stderr so stdout stays free for results.
pub fn init_with_level(level: tracing::Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests;
