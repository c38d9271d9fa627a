//! Local network discovery
//!
//! Units announce themselves over mDNS with their zeroconf APN as the
//! instance name. Discovery resolves those announcements to hosts and
//! writes the resulting API addresses into the configuration.

mod device;
mod mdns;
mod refresh;

pub use device::{DiscoveredDevice, Discoverer, DiscoveryError, DiscoveryResult};
pub use mdns::{MdnsDiscoverer, DEFAULT_SERVICE_TYPE};
pub use refresh::{device_address, refresh_addresses, AddressSummary, DISCOVERY_TIMEOUT};
