//! JSON bodies exchanged with a unit

use daikinbr_core::{ClimateCommand, ClimateState, FanMode, HvacMode};
use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceResult};

/// Outer body of every request and response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub enc_data: String,
}

/// Decrypted payload: the unit's single indoor port
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortPayload {
    pub port1: PortState,
}

/// Port fields; requests carry only the fields being changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensors: Option<Sensors>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sensors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_temp: Option<f64>,
}

fn mode_code(mode: HvacMode) -> Option<u8> {
    match mode {
        HvacMode::Auto => Some(0),
        HvacMode::Dry => Some(1),
        HvacMode::Cool => Some(2),
        HvacMode::Heat => Some(3),
        HvacMode::FanOnly => Some(6),
        HvacMode::Off => None,
    }
}

fn mode_from_code(code: u8) -> DeviceResult<HvacMode> {
    match code {
        0 => Ok(HvacMode::Auto),
        1 => Ok(HvacMode::Dry),
        2 => Ok(HvacMode::Cool),
        3 => Ok(HvacMode::Heat),
        6 => Ok(HvacMode::FanOnly),
        code => Err(DeviceError::UnknownCode { field: "mode", code }),
    }
}

fn fan_code(fan: FanMode) -> u8 {
    match fan {
        FanMode::Auto => 0,
        FanMode::Low => 1,
        FanMode::Medium => 2,
        FanMode::High => 3,
    }
}

fn fan_from_code(code: u8) -> DeviceResult<FanMode> {
    match code {
        0 => Ok(FanMode::Auto),
        1 => Ok(FanMode::Low),
        2 => Ok(FanMode::Medium),
        3 => Ok(FanMode::High),
        code => Err(DeviceError::UnknownCode { field: "fan", code }),
    }
}

impl PortState {
    /// Full port state for a snapshot
    pub fn from_state(state: &ClimateState) -> Self {
        Self {
            power: Some(u8::from(state.power)),
            mode: mode_code(state.mode),
            fan: Some(fan_code(state.fan_mode)),
            temperature: Some(state.target_temperature),
            sensors: Some(Sensors {
                room_temp: state.current_temperature,
            }),
        }
    }

    /// Partial port state carrying a single command
    pub fn from_command(command: &ClimateCommand) -> Self {
        match command {
            ClimateCommand::SetMode(HvacMode::Off) => Self {
                power: Some(0),
                ..Default::default()
            },
            ClimateCommand::SetMode(mode) => Self {
                power: Some(1),
                mode: mode_code(*mode),
                ..Default::default()
            },
            ClimateCommand::SetFanMode(fan) => Self {
                fan: Some(fan_code(*fan)),
                ..Default::default()
            },
            ClimateCommand::SetTargetTemperature(temperature) => Self {
                temperature: Some(*temperature),
                ..Default::default()
            },
        }
    }

    /// Interpret a full port state reported by a unit
    pub fn to_state(&self) -> DeviceResult<ClimateState> {
        let missing = |field: &str| DeviceError::Malformed(format!("missing field '{}'", field));

        Ok(ClimateState {
            power: self.power.ok_or_else(|| missing("power"))? != 0,
            mode: mode_from_code(self.mode.ok_or_else(|| missing("mode"))?)?,
            fan_mode: fan_from_code(self.fan.ok_or_else(|| missing("fan"))?)?,
            target_temperature: self.temperature.ok_or_else(|| missing("temperature"))?,
            current_temperature: self.sensors.as_ref().and_then(|s| s.room_temp),
        })
    }
}
