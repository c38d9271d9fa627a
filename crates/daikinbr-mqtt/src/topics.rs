//! Topic layout of one climate entity

/// Availability payload of a reachable unit
pub const PAYLOAD_AVAILABLE: &str = "online";

/// Availability payload of an unreachable unit
pub const PAYLOAD_NOT_AVAILABLE: &str = "offline";

/// Topics used by one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub availability: String,
    pub state: String,
    pub mode_command: String,
    pub fan_mode_command: String,
    pub temperature_command: String,
    /// Home Assistant discovery config topic
    pub discovery: String,
}

impl Topics {
    pub fn new(topic_prefix: &str, discovery_prefix: &str, mqtt_id: &str) -> Self {
        let topic_prefix = topic_prefix.trim_end_matches('/');
        let discovery_prefix = discovery_prefix.trim_end_matches('/');
        let base = format!("{}/{}", topic_prefix, mqtt_id);

        Self {
            availability: format!("{}/availability", base),
            state: format!("{}/state", base),
            mode_command: format!("{}/mode/set", base),
            fan_mode_command: format!("{}/fan_mode/set", base),
            temperature_command: format!("{}/temperature/set", base),
            discovery: format!("{}/climate/{}/config", discovery_prefix, mqtt_id),
        }
    }
}
