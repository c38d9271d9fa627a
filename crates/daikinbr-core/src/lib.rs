//! Core types for the Daikin Smart AC bridge
//!
//! This crate provides the types shared by every other crate of the
//! workspace: the cloud `Thing` record, APN helpers, the climate model
//! (modes, state, commands) and device address normalisation.

mod address;
mod apn;
mod climate;
mod thing;

pub use address::{device_url, AddressError, DEVICE_API_PORT};
pub use apn::{mqtt_id_for_apn, thing_apn_from_zeroconf, THING_APN_PREFIX, ZEROCONF_APN_PREFIX};
pub use climate::{ClimateCommand, ClimateState, FanMode, HvacMode, ModeParseError};
pub use thing::Thing;

/// Fan modes assigned to devices created from the cloud device list
pub const DEFAULT_FAN_MODES: [FanMode; 4] =
    [FanMode::Auto, FanMode::Low, FanMode::Medium, FanMode::High];

/// Operation modes assigned to devices created from the cloud device list
///
/// `heat` is appended for things that report a heat pump.
pub const DEFAULT_OPERATION_MODES: [HvacMode; 5] = [
    HvacMode::Auto,
    HvacMode::Off,
    HvacMode::Cool,
    HvacMode::Dry,
    HvacMode::FanOnly,
];
