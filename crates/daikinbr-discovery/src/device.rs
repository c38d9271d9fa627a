//! Discovered devices and the discovery seam

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Result type for discovery
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors raised while browsing the network
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mDNS error: {0}")]
    Mdns(#[from] mdns_sd::Error),
}

/// A unit found on the local network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Zeroconf APN (`DAIKIN:A07B79AB5497`)
    pub apn: String,
    /// mDNS host name (`DAIKIN797BA0.local.`)
    pub hostname: String,
    /// Resolved addresses, sorted
    pub addresses: Vec<IpAddr>,
}

impl DiscoveredDevice {
    /// Host to reach the unit at: the first IPv4 address, else the host name
    pub fn host(&self) -> String {
        self.addresses
            .iter()
            .find(|ip| ip.is_ipv4())
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| self.hostname.trim_end_matches('.').to_string())
    }
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.apn, self.host())
    }
}

/// Something able to list the units on the local network
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Browse for `timeout` and return every unit seen
    async fn discover(&self, timeout: Duration) -> DiscoveryResult<Vec<DiscoveredDevice>>;
}
