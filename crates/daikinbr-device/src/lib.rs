//! Local API client for Daikin Smart AC units
//!
//! Each unit exposes an HTTP API on port 15914. Request and response
//! bodies are JSON envelopes whose payload is sealed with the unit's
//! pairing key (AES-256-GCM).

mod cipher;
mod client;
mod error;
mod wire;

pub use cipher::{decode_secret_key, PayloadCipher};
pub use client::{AcDevice, DaikinClient, STATUS_PATH};
pub use error::{DeviceError, DeviceResult};
pub use wire::{Envelope, PortPayload, PortState, Sensors};
