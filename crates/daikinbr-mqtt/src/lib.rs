//! Message bus and Home Assistant climate entity
//!
//! [`MessageBus`] is the publish/subscribe seam. [`MqttBus`] talks to an
//! MQTT broker; [`LocalBus`] routes messages in memory. [`ClimateEntity`]
//! exposes one air conditioner on a bus using the Home Assistant MQTT
//! climate discovery schema.

mod bus;
mod discovery;
mod entity;
mod local;
mod mqtt;
mod router;
mod topics;

pub use bus::{BusError, BusResult, Message, MessageBus, Subscription};
pub use discovery::{ClimateDiscovery, DeviceInfo};
pub use entity::{ClimateEntity, EntityInfo, MAX_TEMPERATURE, MIN_TEMPERATURE};
pub use local::LocalBus;
pub use mqtt::{parse_broker_address, MqttBus, DEFAULT_MQTT_PORT};
pub use topics::{Topics, PAYLOAD_AVAILABLE, PAYLOAD_NOT_AVAILABLE};
