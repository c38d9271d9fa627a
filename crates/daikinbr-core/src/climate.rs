//! Climate model shared by the device client and the MQTT entity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a mode name is not recognised
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModeParseError {
    #[error("unknown hvac mode '{0}'")]
    HvacMode(String),

    #[error("unknown fan mode '{0}'")]
    FanMode(String),
}

/// Operation mode, named the way Home Assistant names climate modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Auto,
    Off,
    Cool,
    Dry,
    FanOnly,
    Heat,
}

impl HvacMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Auto => "auto",
            HvacMode::Off => "off",
            HvacMode::Cool => "cool",
            HvacMode::Dry => "dry",
            HvacMode::FanOnly => "fan_only",
            HvacMode::Heat => "heat",
        }
    }
}

impl FromStr for HvacMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "auto" => Ok(HvacMode::Auto),
            "off" => Ok(HvacMode::Off),
            "cool" => Ok(HvacMode::Cool),
            "dry" => Ok(HvacMode::Dry),
            "fan_only" => Ok(HvacMode::FanOnly),
            "heat" => Ok(HvacMode::Heat),
            other => Err(ModeParseError::HvacMode(other.to_string())),
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fan speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanMode {
    Auto,
    Low,
    Medium,
    High,
}

impl FanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FanMode::Auto => "auto",
            FanMode::Low => "low",
            FanMode::Medium => "medium",
            FanMode::High => "high",
        }
    }
}

impl FromStr for FanMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "auto" => Ok(FanMode::Auto),
            "low" => Ok(FanMode::Low),
            "medium" => Ok(FanMode::Medium),
            "high" => Ok(FanMode::High),
            other => Err(ModeParseError::FanMode(other.to_string())),
        }
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an air conditioner's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateState {
    /// Whether the unit is running
    pub power: bool,
    /// Last selected operation mode (kept while powered off)
    pub mode: HvacMode,
    pub fan_mode: FanMode,
    /// Target temperature in °C
    pub target_temperature: f64,
    /// Room temperature in °C, if the unit reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_temperature: Option<f64>,
}

impl ClimateState {
    /// The mode as seen by Home Assistant: `off` whenever the unit is off
    pub fn hvac_mode(&self) -> HvacMode {
        if self.power {
            self.mode
        } else {
            HvacMode::Off
        }
    }

    /// Apply a command to this snapshot
    ///
    /// Selecting `off` powers the unit down and keeps the last mode; any
    /// other mode powers it up.
    pub fn apply(&mut self, command: &ClimateCommand) {
        match command {
            ClimateCommand::SetMode(HvacMode::Off) => self.power = false,
            ClimateCommand::SetMode(mode) => {
                self.power = true;
                self.mode = *mode;
            }
            ClimateCommand::SetFanMode(fan_mode) => self.fan_mode = *fan_mode,
            ClimateCommand::SetTargetTemperature(temperature) => {
                self.target_temperature = *temperature
            }
        }
    }
}

impl Default for ClimateState {
    fn default() -> Self {
        Self {
            power: false,
            mode: HvacMode::Auto,
            fan_mode: FanMode::Auto,
            target_temperature: 24.0,
            current_temperature: None,
        }
    }
}

/// A change requested through the message bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClimateCommand {
    SetMode(HvacMode),
    SetFanMode(FanMode),
    SetTargetTemperature(f64),
}
