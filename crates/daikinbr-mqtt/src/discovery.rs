//! Home Assistant MQTT climate discovery payload

use daikinbr_core::{FanMode, HvacMode};
use serde::{Deserialize, Serialize};

use crate::topics::{Topics, PAYLOAD_AVAILABLE, PAYLOAD_NOT_AVAILABLE};

const MANUFACTURER: &str = "Daikin";
const MODEL: &str = "Smart AC";

/// Device block grouping the entity in the Home Assistant device registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

/// Config published on the discovery topic of a climate entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateDiscovery {
    pub name: String,
    pub unique_id: String,
    pub device: DeviceInfo,

    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,

    pub modes: Vec<HvacMode>,
    pub fan_modes: Vec<FanMode>,

    pub mode_command_topic: String,
    pub mode_state_topic: String,
    pub mode_state_template: String,

    pub fan_mode_command_topic: String,
    pub fan_mode_state_topic: String,
    pub fan_mode_state_template: String,

    pub temperature_command_topic: String,
    pub temperature_state_topic: String,
    pub temperature_state_template: String,

    pub current_temperature_topic: String,
    pub current_temperature_template: String,

    pub min_temp: f64,
    pub max_temp: f64,
    pub temp_step: f64,
    pub temperature_unit: String,
}

impl ClimateDiscovery {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        mqtt_id: &str,
        topics: &Topics,
        modes: &[HvacMode],
        fan_modes: &[FanMode],
        min_temp: f64,
        max_temp: f64,
        temp_step: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            unique_id: mqtt_id.to_string(),
            device: DeviceInfo {
                identifiers: vec![mqtt_id.to_string()],
                name: name.to_string(),
                manufacturer: MANUFACTURER.to_string(),
                model: MODEL.to_string(),
            },
            availability_topic: topics.availability.clone(),
            payload_available: PAYLOAD_AVAILABLE.to_string(),
            payload_not_available: PAYLOAD_NOT_AVAILABLE.to_string(),
            modes: modes.to_vec(),
            fan_modes: fan_modes.to_vec(),
            mode_command_topic: topics.mode_command.clone(),
            mode_state_topic: topics.state.clone(),
            mode_state_template: "{{ value_json.mode }}".to_string(),
            fan_mode_command_topic: topics.fan_mode_command.clone(),
            fan_mode_state_topic: topics.state.clone(),
            fan_mode_state_template: "{{ value_json.fan_mode }}".to_string(),
            temperature_command_topic: topics.temperature_command.clone(),
            temperature_state_topic: topics.state.clone(),
            temperature_state_template: "{{ value_json.target_temperature }}".to_string(),
            current_temperature_topic: topics.state.clone(),
            current_temperature_template: "{{ value_json.current_temperature }}".to_string(),
            min_temp,
            max_temp,
            temp_step,
            temperature_unit: "C".to_string(),
        }
    }
}
