//! Configuration store for the Daikin Smart AC bridge
//!
//! The bridge keeps its state in a single YAML file:
//!
//! ```yaml
//! mqtt:
//!   address: tcp://core-mosquitto:1883
//!   username: addons
//!   password: secret
//! devices:
//!   - thing_id: "1234"
//!     mqtt_id: daikin797ba0
//!     name: Living room
//!     apn: DAIKIN797BA0
//!     address: http://192.168.1.20:15914
//!     secret_key: c2VjcmV0LWtleQ==
//!     operation_modes: [auto, off, cool, dry, fan_only]
//!     fan_modes: [auto, low, medium, high]
//! ```
//!
//! The device list is filled from the vendor cloud and local discovery, then
//! written back so later starts can skip both.

mod error;
mod settings;
mod store;

pub use error::{ConfigError, ConfigResult};
pub use settings::{parse_bool, Settings, DEFAULT_CONFIG_FILE};
pub use store::{
    Config, DeviceConfig, MergeOutcome, MqttConfig, SyncConfig, DEFAULT_DISCOVERY_PREFIX,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TOPIC_PREFIX,
};
