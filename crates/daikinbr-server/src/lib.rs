//! Daikin Smart AC bridge
//!
//! Prepares the configuration (cloud device list, local addresses) and
//! exposes every configured air conditioner on the message bus.

pub mod bootstrap;
pub mod error;
pub mod orchestrator;

pub use bootstrap::{prepare_config, startup_hint, CloudConnector, IotalabsConnector};
pub use error::{BridgeError, BridgeResult};
pub use orchestrator::{DeviceFactory, HttpDeviceFactory, Orchestrator};
