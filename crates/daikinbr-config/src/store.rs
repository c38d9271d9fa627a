//! The persisted device list and bus settings

use daikinbr_core::{
    mqtt_id_for_apn, thing_apn_from_zeroconf, FanMode, HvacMode, Thing, DEFAULT_FAN_MODES,
    DEFAULT_OPERATION_MODES,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Default Home Assistant MQTT discovery prefix
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Default root of the bridge's own topics
pub const DEFAULT_TOPIC_PREFIX: &str = "daikinbr";

/// Default interval between device state polls
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Root of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    #[serde(default, skip_serializing_if = "SyncConfig::is_default")]
    pub sync: SyncConfig,
}

/// MQTT broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address (`tcp://host:port`, `mqtt://host:port` or `host[:port]`)
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Home Assistant discovery prefix
    #[serde(
        default = "default_discovery_prefix",
        skip_serializing_if = "is_default_discovery_prefix"
    )]
    pub discovery_prefix: String,

    /// Root of the state/command topics
    #[serde(
        default = "default_topic_prefix",
        skip_serializing_if = "is_default_topic_prefix"
    )]
    pub topic_prefix: String,
}

impl MqttConfig {
    /// True when no connection setting has been provided at all
    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.username.is_empty() && self.password.is_empty()
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            username: String::new(),
            password: String::new(),
            discovery_prefix: default_discovery_prefix(),
            topic_prefix: default_topic_prefix(),
        }
    }
}

fn default_discovery_prefix() -> String {
    DEFAULT_DISCOVERY_PREFIX.to_string()
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.to_string()
}

fn is_default_discovery_prefix(value: &str) -> bool {
    value == DEFAULT_DISCOVERY_PREFIX
}

fn is_default_topic_prefix(value: &str) -> bool {
    value == DEFAULT_TOPIC_PREFIX
}

/// State synchronisation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between two device state polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl SyncConfig {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// One air conditioner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Cloud thing identifier
    #[serde(default)]
    pub thing_id: String,

    /// Object id used in MQTT topics and the Home Assistant unique id
    #[serde(default)]
    pub mqtt_id: String,

    #[serde(default)]
    pub name: String,

    /// Network name announced by the device
    #[serde(default)]
    pub apn: String,

    /// Local API address; resolved by discovery when empty
    #[serde(default)]
    pub address: String,

    /// Base64 pairing key
    #[serde(default)]
    pub secret_key: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operation_modes: Vec<HvacMode>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fan_modes: Vec<FanMode>,
}

impl DeviceConfig {
    /// Build a device entry for a thing seen for the first time
    pub fn from_thing(thing: &Thing) -> Self {
        let mut operation_modes = DEFAULT_OPERATION_MODES.to_vec();
        if thing.heat {
            operation_modes.push(HvacMode::Heat);
        }

        Self {
            thing_id: thing.id.clone(),
            mqtt_id: mqtt_id_for_apn(&thing.apn),
            name: thing.name.clone(),
            apn: thing.apn.clone(),
            address: String::new(),
            secret_key: thing.secret_key.clone(),
            operation_modes,
            fan_modes: DEFAULT_FAN_MODES.to_vec(),
        }
    }
}

/// What [`Config::merge_thing`] did with a thing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Updated,
    Created,
}

impl Config {
    /// An empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from a YAML file
    pub fn read(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!("Reading configuration file: {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::ReadFile {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write the configuration to a YAML file
    ///
    /// Writes to a temp file first, then renames it over the target.
    pub fn write(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = temp_path_for(path);
        fs::write(&temp_path, content).map_err(|e| ConfigError::WriteFile {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        debug!("Saved configuration file: {:?}", path);
        Ok(())
    }

    /// Find a device by cloud thing id
    pub fn lookup_device_by_thing_id(&mut self, thing_id: &str) -> Option<&mut DeviceConfig> {
        self.devices.iter_mut().find(|d| d.thing_id == thing_id)
    }

    /// Find a device by APN
    ///
    /// Accepts either the thing APN (`DAIKIN797BA0`) or the zeroconf APN
    /// announced on the network (`DAIKIN:A07B79AB5497`).
    pub fn lookup_device_by_apn(&mut self, apn: &str) -> Option<&mut DeviceConfig> {
        let converted = thing_apn_from_zeroconf(apn);
        self.devices
            .iter_mut()
            .find(|d| d.apn == apn || d.apn == converted)
    }

    /// Merge a cloud thing: update the matching device or append a new one
    ///
    /// Updates overwrite name, APN and secret key only; the MQTT id, address
    /// and mode lists chosen by the user are preserved.
    pub fn merge_thing(&mut self, thing: &Thing) -> MergeOutcome {
        match self.lookup_device_by_thing_id(&thing.id) {
            Some(device) => {
                device.name = thing.name.clone();
                device.apn = thing.apn.clone();
                device.secret_key = thing.secret_key.clone();
                MergeOutcome::Updated
            }
            None => {
                self.devices.push(DeviceConfig::from_thing(thing));
                MergeOutcome::Created
            }
        }
    }

    /// Whether any device still lacks a network address
    pub fn missing_addresses(&self) -> bool {
        self.devices.iter().any(|d| d.address.trim().is_empty())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
