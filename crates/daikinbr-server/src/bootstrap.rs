//! Configuration preparation at startup

use daikinbr_cloud::{
    refresh_things, CloudAccount, CloudResult, CloudSettings, IotalabsAccount, REQUIRED_SETTINGS,
};
use daikinbr_config::{Config, Settings};
use daikinbr_discovery::{refresh_addresses, Discoverer};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::BridgeResult;

/// Opens a session-less handle on the vendor cloud account
pub trait CloudConnector: Send + Sync {
    fn connect(&self, settings: &Settings) -> CloudResult<Box<dyn CloudAccount>>;
}

/// Connects to the Iotalabs cloud with the account from the settings
#[derive(Debug, Default, Clone, Copy)]
pub struct IotalabsConnector;

impl CloudConnector for IotalabsConnector {
    fn connect(&self, settings: &Settings) -> CloudResult<Box<dyn CloudAccount>> {
        let cloud = CloudSettings::from_settings(settings)?;
        Ok(Box::new(IotalabsAccount::new(cloud)?))
    }
}

/// Context for a failed startup, naming the settings a first run needs
pub fn startup_hint() -> String {
    format!(
        "failed to prepare configuration (a first run needs {})",
        REQUIRED_SETTINGS.join(", ")
    )
}

/// Load the configuration and bring it up to date
///
/// A missing file starts an empty configuration and forces a cloud
/// refresh. A file that cannot be read or parsed is an error and is left
/// untouched. Local discovery runs when a device lacks an address or when
/// the settings ask for it. The file is written back when either refresh
/// ran.
pub async fn prepare_config(
    settings: &Settings,
    cloud: &dyn CloudConnector,
    discoverer: &dyn Discoverer,
    discovery_timeout: Duration,
) -> BridgeResult<Config> {
    let (mut config, force_reload) = match Config::read(&settings.config_file) {
        Ok(config) => (config, false),
        Err(e) if e.is_not_found() => {
            warn!("Config file not found, creating a new one: {:?}", settings.config_file);
            (Config::new(), true)
        }
        Err(e) => return Err(e.into()),
    };

    if settings.apply_mqtt(&mut config.mqtt) {
        debug!("Using MQTT settings from the environment");
    }

    let mut changed = false;

    if force_reload || settings.reload_things {
        info!("Refreshing devices from the cloud");
        let account = cloud.connect(settings)?;
        let summary = refresh_things(&mut config, account.as_ref()).await?;
        info!(
            created = summary.created,
            updated = summary.updated,
            "Device list refreshed"
        );
        changed = true;
    }

    if config.missing_addresses() || settings.reload_addresses {
        let summary = refresh_addresses(&mut config, discoverer, discovery_timeout).await;
        debug!(updated = summary.updated, unknown = summary.unknown, "Addresses refreshed");
        changed = true;
    }

    if changed {
        config.write(&settings.config_file)?;
        info!("Saved configuration file: {:?}", settings.config_file);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use async_trait::async_trait;
    use daikinbr_cloud::CloudError;
    use daikinbr_core::Thing;
    use daikinbr_discovery::{DiscoveredDevice, DiscoveryResult};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Clone)]
    struct StaticAccount(Vec<Thing>);

    #[async_trait]
    impl CloudAccount for StaticAccount {
        async fn fetch_things(&self) -> CloudResult<Vec<Thing>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct FakeCloud {
        things: Vec<Thing>,
        connects: AtomicUsize,
    }

    impl CloudConnector for FakeCloud {
        fn connect(&self, _settings: &Settings) -> CloudResult<Box<dyn CloudAccount>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StaticAccount(self.things.clone())))
        }
    }

    #[derive(Default)]
    struct FakeNetwork {
        units: Vec<DiscoveredDevice>,
        browses: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Discoverer for FakeNetwork {
        async fn discover(&self, _timeout: Duration) -> DiscoveryResult<Vec<DiscoveredDevice>> {
            self.browses.fetch_add(1, Ordering::SeqCst);
            Ok(self.units.clone())
        }
    }

    fn settings(dir: &Path) -> Settings {
        Settings {
            config_file: dir.join("config.yaml"),
            mqtt_address: "tcp://core-mosquitto:1883".to_string(),
            mqtt_username: "addons".to_string(),
            mqtt_password: "secret".to_string(),
            ..Default::default()
        }
    }

    fn thing() -> Thing {
        Thing {
            id: "thing-1".to_string(),
            name: "Living room".to_string(),
            apn: "DAIKIN797BA0".to_string(),
            secret_key: "c2VjcmV0".to_string(),
            heat: false,
        }
    }

    fn living_room_unit() -> DiscoveredDevice {
        DiscoveredDevice {
            apn: "DAIKIN:A07B79AB5497".to_string(),
            hostname: "DAIKIN797BA0.local.".to_string(),
            addresses: vec!["192.168.1.40".parse().unwrap()],
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_missing_file_forces_cloud_refresh() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        let cloud = FakeCloud {
            things: vec![thing()],
            ..Default::default()
        };
        let network = FakeNetwork {
            units: vec![living_room_unit()],
            ..Default::default()
        };

        let config = prepare_config(&settings, &cloud, &network, TIMEOUT)
            .await
            .unwrap();

        assert_eq!(cloud.connects.load(Ordering::SeqCst), 1);
        assert_eq!(config.mqtt.address, "tcp://core-mosquitto:1883");
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].mqtt_id, "daikin797ba0");
        assert_eq!(config.devices[0].address, "http://192.168.1.40:15914");

        let saved = Config::read(&settings.config_file).unwrap();
        assert_eq!(saved, config);
    }

    #[tokio::test]
    async fn test_missing_file_without_credentials_fails() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());

        let result = prepare_config(
            &settings,
            &IotalabsConnector,
            &FakeNetwork::default(),
            TIMEOUT,
        )
        .await;

        assert!(matches!(
            result,
            Err(BridgeError::Cloud(CloudError::MissingSetting(_)))
        ));
        assert!(!settings.config_file.exists());
    }

    #[test]
    fn test_startup_hint_names_cloud_settings() {
        let hint = startup_hint();
        for name in [
            "DAIKINBR_CONFIG_ACCOUNT_EMAIL",
            "DAIKINBR_CONFIG_ACCOUNT_PASSWORD",
            "DAIKINBR_CLOUD_CLIENT_ID",
            "DAIKINBR_CLOUD_MANAGE_THING_URL",
        ] {
            assert!(hint.contains(name), "{} missing from {}", name, hint);
        }
    }

    #[tokio::test]
    async fn test_malformed_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        fs::write(&settings.config_file, "devices: [unclosed").unwrap();
        let cloud = FakeCloud::default();

        let result = prepare_config(&settings, &cloud, &FakeNetwork::default(), TIMEOUT).await;

        assert!(matches!(result, Err(BridgeError::Config(_))));
        assert_eq!(cloud.connects.load(Ordering::SeqCst), 0);
        assert_eq!(
            fs::read_to_string(&settings.config_file).unwrap(),
            "devices: [unclosed"
        );
    }

    #[tokio::test]
    async fn test_complete_file_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        let content = "# hand edited\nmqtt:\n  address: tcp://broker:1883\ndevices:\n  - thing_id: thing-1\n    mqtt_id: bedroom\n    name: Bedroom\n    apn: DAIKIN797BA0\n    address: http://10.0.0.9:15914\n    secret_key: c2VjcmV0\n";
        fs::write(&settings.config_file, content).unwrap();
        let cloud = FakeCloud::default();
        let network = FakeNetwork::default();

        let config = prepare_config(&settings, &cloud, &network, TIMEOUT)
            .await
            .unwrap();

        assert_eq!(config.mqtt.address, "tcp://broker:1883");
        assert_eq!(config.devices[0].mqtt_id, "bedroom");
        assert_eq!(cloud.connects.load(Ordering::SeqCst), 0);
        assert_eq!(network.browses.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read_to_string(&settings.config_file).unwrap(), content);
    }

    #[tokio::test]
    async fn test_reload_flags_force_both_refreshes() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(dir.path());
        settings.reload_things = true;
        settings.reload_addresses = true;

        let mut existing = Config::new();
        existing.merge_thing(&thing());
        existing.devices[0].address = "http://10.0.0.9:15914".to_string();
        existing.devices[0].mqtt_id = "bedroom".to_string();
        existing.write(&settings.config_file).unwrap();

        let renamed = Thing {
            name: "Master bedroom".to_string(),
            ..thing()
        };
        let cloud = FakeCloud {
            things: vec![renamed],
            ..Default::default()
        };
        let network = FakeNetwork {
            units: vec![living_room_unit()],
            ..Default::default()
        };

        let config = prepare_config(&settings, &cloud, &network, TIMEOUT)
            .await
            .unwrap();

        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].name, "Master bedroom");
        assert_eq!(config.devices[0].mqtt_id, "bedroom");
        assert_eq!(config.devices[0].address, "http://192.168.1.40:15914");
        assert_eq!(Config::read(&settings.config_file).unwrap(), config);
    }

    #[tokio::test]
    async fn test_missing_address_triggers_discovery() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());

        let mut existing = Config::new();
        existing.merge_thing(&thing());
        existing.write(&settings.config_file).unwrap();

        let cloud = FakeCloud::default();
        let network = FakeNetwork::default();

        let config = prepare_config(&settings, &cloud, &network, TIMEOUT)
            .await
            .unwrap();

        assert_eq!(cloud.connects.load(Ordering::SeqCst), 0);
        assert_eq!(network.browses.load(Ordering::SeqCst), 1);
        // Nothing found: the device keeps an empty address
        assert!(config.devices[0].address.is_empty());
    }
}
