//! Address refresh from local discovery

use daikinbr_config::Config;
use daikinbr_core::DEVICE_API_PORT;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::device::Discoverer;

/// How long the network is browsed
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of an address refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressSummary {
    /// Configured devices whose address was set
    pub updated: usize,
    /// Discovered units with no matching configured device
    pub unknown: usize,
}

/// API address of a unit reachable at `host`
pub fn device_address(host: &str) -> String {
    format!("http://{}:{}", host, DEVICE_API_PORT)
}

/// Browse the network and record the address of every configured device found
///
/// Discovery failures are logged and leave the configuration untouched.
pub async fn refresh_addresses(
    config: &mut Config,
    discoverer: &dyn Discoverer,
    timeout: Duration,
) -> AddressSummary {
    info!(timeout = ?timeout, "Discovering devices in the local network");

    let discovered = match discoverer.discover(timeout).await {
        Ok(discovered) => discovered,
        Err(e) => {
            error!(error = %e, "Error discovering devices");
            return AddressSummary::default();
        }
    };

    if discovered.is_empty() {
        info!("No devices were discovered in the local network");
    }

    let mut summary = AddressSummary::default();
    for unit in &discovered {
        info!(device = %unit, "Discovered device");

        match config.lookup_device_by_apn(&unit.apn) {
            Some(device) => {
                device.address = device_address(&unit.host());
                info!(thing_id = %device.thing_id, address = %device.address, "Updated device address");
                summary.updated += 1;
            }
            None => {
                warn!(device = %unit, "Discovered device not found in config");
                summary.unknown += 1;
            }
        }
    }

    summary
}
