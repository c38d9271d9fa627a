//! mDNS browser

use async_trait::async_trait;
use daikinbr_core::THING_APN_PREFIX;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use crate::device::{DiscoveredDevice, Discoverer, DiscoveryResult};

/// Service type the units register under
pub const DEFAULT_SERVICE_TYPE: &str = "_http._tcp.local.";

/// Discovers units by browsing an mDNS service type
#[derive(Debug, Clone)]
pub struct MdnsDiscoverer {
    service_type: String,
}

impl MdnsDiscoverer {
    pub fn new() -> Self {
        Self::with_service_type(DEFAULT_SERVICE_TYPE)
    }

    /// Browse a different service type
    pub fn with_service_type(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
        }
    }

    /// Convert a resolved service into a unit, if it is one of ours
    fn to_device(&self, info: &ServiceInfo) -> Option<DiscoveredDevice> {
        let apn = instance_name(info.get_fullname(), &self.service_type);
        if !apn.starts_with(THING_APN_PREFIX) {
            trace!(fullname = info.get_fullname(), "Ignoring foreign service");
            return None;
        }

        let mut addresses: Vec<_> = info.get_addresses().iter().copied().collect();
        addresses.sort();

        Some(DiscoveredDevice {
            apn: apn.to_string(),
            hostname: info.get_hostname().to_string(),
            addresses,
        })
    }
}

impl Default for MdnsDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Discoverer for MdnsDiscoverer {
    async fn discover(&self, timeout: Duration) -> DiscoveryResult<Vec<DiscoveredDevice>> {
        let daemon = ServiceDaemon::new()?;
        let receiver = daemon.browse(&self.service_type)?;
        let deadline = Instant::now() + timeout;
        let mut found: Vec<DiscoveredDevice> = Vec::new();

        while let Ok(Ok(event)) = timeout_at(deadline, receiver.recv_async()).await {
            if let ServiceEvent::ServiceResolved(info) = event {
                let Some(device) = self.to_device(&info) else {
                    continue;
                };
                match found.iter_mut().find(|d| d.apn == device.apn) {
                    Some(existing) => *existing = device,
                    None => {
                        debug!(apn = %device.apn, host = %device.host(), "Resolved unit");
                        found.push(device);
                    }
                }
            }
        }

        if let Err(e) = daemon.stop_browse(&self.service_type) {
            debug!("Failed to stop mDNS browse: {}", e);
        }
        if let Err(e) = daemon.shutdown() {
            debug!("Failed to shut down mDNS daemon: {}", e);
        }

        Ok(found)
    }
}

/// Instance part of an mDNS full name
fn instance_name<'a>(fullname: &'a str, service_type: &str) -> &'a str {
    fullname
        .strip_suffix(service_type)
        .map(|s| s.trim_end_matches('.'))
        .unwrap_or(fullname)
}
