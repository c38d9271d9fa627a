//! Settings read from the process environment
//!
//! The add-on supervisor passes its options to the bridge as
//! `DAIKINBR_*` environment variables.

use std::env;
use std::path::PathBuf;
use tracing::debug;

use crate::store::MqttConfig;

/// Location of the configuration file inside the add-on container
pub const DEFAULT_CONFIG_FILE: &str = "/config/config.yaml";

const CONFIG_FILE: &str = "DAIKINBR_CONFIG_FILE";
const MQTT_ADDRESS: &str = "DAIKINBR_CONFIG_MQTT_ADDRESS";
const MQTT_USER: &str = "DAIKINBR_CONFIG_MQTT_USER";
const MQTT_PASSWORD: &str = "DAIKINBR_CONFIG_MQTT_PASSWORD";
const RELOAD_THINGS: &str = "DAIKINBR_CONFIG_RELOAD_THINGS";
const RELOAD_ADDRESSES: &str = "DAIKINBR_CONFIG_RELOAD_ADDRESSES";
const ACCOUNT_EMAIL: &str = "DAIKINBR_CONFIG_ACCOUNT_EMAIL";
const ACCOUNT_PASSWORD: &str = "DAIKINBR_CONFIG_ACCOUNT_PASSWORD";
const CLOUD_REGION: &str = "DAIKINBR_CLOUD_REGION";
const CLOUD_CLIENT_ID: &str = "DAIKINBR_CLOUD_CLIENT_ID";
const CLOUD_MANAGE_THING_URL: &str = "DAIKINBR_CLOUD_MANAGE_THING_URL";

/// Bridge settings taken from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Path of the YAML configuration file
    pub config_file: PathBuf,
    pub mqtt_address: String,
    pub mqtt_username: String,
    pub mqtt_password: String,
    /// Force a refresh of the device list from the cloud
    pub reload_things: bool,
    /// Force a local network discovery
    pub reload_addresses: bool,
    pub account_email: Option<String>,
    pub account_password: Option<String>,
    pub cloud_region: Option<String>,
    pub cloud_client_id: Option<String>,
    pub cloud_manage_thing_url: Option<String>,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).unwrap_or_default();
        let optional = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let flag = |key: &str| {
            let raw = text(key);
            match parse_bool(&raw) {
                Some(value) => value,
                None => {
                    if !raw.is_empty() {
                        debug!(variable = key, value = %raw, "Ignoring non-boolean value");
                    }
                    false
                }
            }
        };

        Self {
            config_file: optional(CONFIG_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
            mqtt_address: text(MQTT_ADDRESS),
            mqtt_username: text(MQTT_USER),
            mqtt_password: text(MQTT_PASSWORD),
            reload_things: flag(RELOAD_THINGS),
            reload_addresses: flag(RELOAD_ADDRESSES),
            account_email: optional(ACCOUNT_EMAIL),
            account_password: optional(ACCOUNT_PASSWORD),
            cloud_region: optional(CLOUD_REGION),
            cloud_client_id: optional(CLOUD_CLIENT_ID),
            cloud_manage_thing_url: optional(CLOUD_MANAGE_THING_URL),
        }
    }

    /// Fill the MQTT settings from the environment when the file has none
    ///
    /// Returns whether the settings were applied. A file that sets any of
    /// address, username or password is left untouched.
    pub fn apply_mqtt(&self, mqtt: &mut MqttConfig) -> bool {
        if !mqtt.is_empty() {
            return false;
        }

        mqtt.address = self.mqtt_address.clone();
        mqtt.username = self.mqtt_username.clone();
        mqtt.password = self.mqtt_password.clone();
        true
    }
}

/// Parse a boolean the way the add-on options are spelled
///
/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their false
/// counterparts; anything else is `None`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
