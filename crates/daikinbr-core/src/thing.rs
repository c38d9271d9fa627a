//! Cloud thing record

use serde::{Deserialize, Serialize};

/// A device as registered in the vendor cloud account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    /// Stable cloud identifier
    pub id: String,
    /// Display name chosen in the vendor app
    pub name: String,
    /// Network name (`DAIKINxxxxxx`)
    pub apn: String,
    /// Base64-encoded pairing key for the local API
    pub secret_key: String,
    /// Whether the unit is a heat pump
    pub heat: bool,
}
